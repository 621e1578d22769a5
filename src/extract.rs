//! Tolerant JSON recovery from raw generated text.
//!
//! Models wrap payloads in markdown fences and append trailing commentary
//! ("undefined", apologies, re-statements of the answer). The extractor peels
//! that noise off in a fixed order and then insists on a strict parse, so a
//! payload either round-trips exactly or is rejected with the original text
//! attached for inspection. Extraction never fails with an error: any parse
//! problem becomes an [`ExtractedArtifact::Invalid`] value.

use serde::Serialize;
use serde_json::Value;

/// Outcome of recovering a structured payload from one step's raw text.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractedArtifact {
    /// A strict JSON parse succeeded after cleanup.
    Value { value: Value },
    /// The text did not contain a parseable payload. `raw_text` carries the
    /// original (pre-truncation) input for diagnostics.
    Invalid { raw_text: String, detail: String },
}

impl ExtractedArtifact {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ExtractedArtifact::Value { value } => Some(value),
            ExtractedArtifact::Invalid { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ExtractedArtifact::Value { .. })
    }
}

/// Recover a JSON object from raw generated text.
///
/// Cleanup order: trim whitespace, strip a surrounding code fence, discard
/// everything after the final `}`, then parse strictly. Idempotent for text
/// that parses on the first pass.
pub fn extract(raw_text: &str) -> ExtractedArtifact {
    let trimmed = raw_text.trim();
    let unfenced = strip_code_fence(trimmed);

    // Models frequently append junk after the structured payload; keep
    // everything up to and including the last closing brace.
    let cleaned = match unfenced.rfind('}') {
        Some(last_brace) => &unfenced[..=last_brace],
        None => unfenced,
    };

    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => ExtractedArtifact::Value { value },
        Err(err) => ExtractedArtifact::Invalid {
            raw_text: raw_text.to_string(),
            detail: err.to_string(),
        },
    }
}

/// Strip a leading fence line (``` with an optional language tag) and a
/// trailing fence line, when both ends look fenced.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the rest of the fence line (language tag, if any).
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => return text,
    };
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => body.trim(),
    }
}
