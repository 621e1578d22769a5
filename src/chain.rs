//! Chain construction and placeholder resolution.
//!
//! A chain is an ordered, immutable list of step specifications. Each step's
//! description template may splice in earlier raw outputs via
//! `{{step_<index>_output}}` placeholders (zero-based). Reference validation
//! happens once at build time so the orchestrator can treat an unresolved
//! index as an internal bug rather than a user error.
//!
//! Substitution is deliberately naive literal replacement, matching the
//! system this engine drives. It lives behind [`resolve_template`] so a
//! stricter templating scheme can be swapped in without touching callers.

use crate::agent::Agent;
use crate::error::{ChainError, StepError};
use crate::tools::Tool;
use std::sync::Arc;

/// One generation task within a chain.
pub struct StepSpec {
    description_template: String,
    expected_output: String,
    agent: Arc<dyn Agent>,
    tools: Vec<Arc<dyn Tool>>,
}

impl StepSpec {
    pub fn new(
        description_template: impl Into<String>,
        expected_output: impl Into<String>,
        agent: Arc<dyn Agent>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            description_template: description_template.into(),
            expected_output: expected_output.into(),
            agent,
            tools,
        }
    }

    pub fn description_template(&self) -> &str {
        &self.description_template
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    /// Tools granted to this step. An empty grant means the step is not
    /// expected to ground itself via a tool.
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }
}

/// An ordered, immutable sequence of steps with validated placeholder
/// references. Reusable: each execution builds its own context.
pub struct Chain {
    steps: Vec<StepSpec>,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl Chain {
    /// Validate placeholder references and freeze the step list.
    ///
    /// Every `{{step_i_output}}` must satisfy `i < position` of the step it
    /// appears in; forward and self references are rejected.
    pub fn build(steps: Vec<StepSpec>) -> Result<Self, ChainError> {
        for (position, step) in steps.iter().enumerate() {
            for index in placeholder_indices(&step.description_template) {
                if index >= position {
                    return Err(ChainError::Malformed(format!(
                        "step {position} references {{{{step_{index}_output}}}}, \
                         which is not an earlier step"
                    )));
                }
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Indices referenced by `{{step_<index>_output}}` placeholders, in order of
/// appearance. Malformed indices (non-numeric, overflowing) never match.
fn placeholder_indices(template: &str) -> Vec<usize> {
    let pattern =
        regex::Regex::new(r"\{\{step_(\d+)_output\}\}").expect("placeholder regex");
    pattern
        .captures_iter(template)
        .filter_map(|caps| caps[1].parse::<usize>().ok())
        .collect()
}

/// Replace every placeholder with the raw text stored at its index.
///
/// `outputs` holds the raw outputs of all completed steps, index-aligned.
/// Referencing an index without an output is a [`StepError`] so the
/// orchestrator can abort instead of feeding a literal placeholder to the
/// model.
pub(crate) fn resolve_template(template: &str, outputs: &[String]) -> Result<String, StepError> {
    let mut resolved = template.to_string();
    let mut indices = placeholder_indices(template);
    indices.sort_unstable();
    indices.dedup();
    for index in indices {
        let output = outputs
            .get(index)
            .ok_or(StepError::UnresolvedPlaceholder(index))?;
        resolved = resolved.replace(&format!("{{{{step_{index}_output}}}}"), output);
    }
    Ok(resolved)
}
