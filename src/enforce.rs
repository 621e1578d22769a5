//! Tool-use enforcement and bounded retry for a single step.
//!
//! A step granted tools is expected to ground its answer through at least one
//! of them. Models sometimes answer from memory instead; this wrapper bounds
//! the cost of that with a small deterministic state machine:
//!
//! - `Attempt(n)`, n from 1 to `max_retries`, is the only non-terminal state.
//! - Tool used with an empty result → terminal `NoData`, never retried.
//! - Tool used with data → terminal `Completed`.
//! - No tool used → corrective instruction appended and retried; once the
//!   budget is exhausted the last answer is returned as `ToolNotUsed`.
//!
//! All bookkeeping is local to one invocation, so shared agents stay safe
//! across concurrent chain runs.

use crate::agent::Agent;
use crate::error::StepError;
use crate::orchestrator::{StepResult, StepStatus};
use crate::tools::Tool;
use serde_json::Value;
use std::sync::Arc;

/// Corrective instruction appended to the prompt after a tool-free attempt.
const TOOL_REMINDER: &str =
    "\nREMEMBER: You MUST use the provided tools. Do not answer without calling at least one tool.";

/// Retry policy for tool enforcement.
#[derive(Debug, Clone, Copy)]
pub struct EnforcePolicy {
    /// Total attempt budget per step invocation.
    pub max_retries: u32,
}

impl Default for EnforcePolicy {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

/// Execute one step under the enforcement policy.
///
/// Steps granted no tools are not expected to ground via a tool and pass
/// through as `Completed`. Execution-layer failures (timeout, completion
/// transport) propagate as [`StepError`] for the orchestrator to abort on.
pub fn enforce_step(
    agent: &dyn Agent,
    prompt: &str,
    tools: &[Arc<dyn Tool>],
    policy: EnforcePolicy,
) -> Result<StepResult, StepError> {
    if tools.is_empty() {
        let outcome = agent.execute(prompt, tools)?;
        return Ok(StepResult {
            raw_text: outcome.raw_text,
            status: StepStatus::Completed,
        });
    }

    let max_attempts = policy.max_retries.max(1);
    let mut current_prompt = prompt.to_string();
    let mut last_text = String::new();

    for attempt in 1..=max_attempts {
        tracing::debug!(role = agent.role(), attempt, "step attempt");
        let outcome = agent.execute(&current_prompt, tools)?;
        last_text = outcome.raw_text;

        if outcome.used_tool {
            if is_empty_payload(outcome.last_tool_output.as_ref()) {
                // An empty tool result means "nothing to report", not a
                // model failure; retrying would burn budget for no reason.
                tracing::info!(role = agent.role(), attempt, "tool returned no data");
                return Ok(StepResult {
                    raw_text: last_text,
                    status: StepStatus::NoData,
                });
            }
            return Ok(StepResult {
                raw_text: last_text,
                status: StepStatus::Completed,
            });
        }

        if attempt < max_attempts {
            tracing::warn!(role = agent.role(), attempt, "no tool used, retrying");
            current_prompt.push_str(TOOL_REMINDER);
        }
    }

    tracing::warn!(
        role = agent.role(),
        attempts = max_attempts,
        "retries exhausted without tool use"
    );
    Ok(StepResult {
        raw_text: last_text,
        status: StepStatus::ToolNotUsed,
    })
}

/// Null, empty string, empty array, and empty object all count as "no data".
fn is_empty_payload(payload: Option<&Value>) -> bool {
    match payload {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ScriptedAgent, StepOutcome};
    use crate::tools::WeatherForecastTool;
    use serde_json::json;

    fn granted_tools() -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(WeatherForecastTool)]
    }

    fn outcome(text: &str, used_tool: bool, last_tool_output: Option<Value>) -> StepOutcome {
        StepOutcome {
            raw_text: text.to_string(),
            used_tool,
            last_tool_output,
        }
    }

    #[test]
    fn tool_free_grant_passes_through() {
        let agent = ScriptedAgent::completing(&["plain answer"]);
        let result = enforce_step(&agent, "prompt", &[], EnforcePolicy::default()).unwrap();
        assert_eq!(result.status, StepStatus::Completed);
        assert_eq!(result.raw_text, "plain answer");
        assert_eq!(agent.invocations(), 1);
    }

    #[test]
    fn tool_use_with_data_completes_first_attempt() {
        let agent = ScriptedAgent::new(
            "grounded",
            vec![outcome("answer", true, Some(json!({"temp": 21})))],
        );
        let result =
            enforce_step(&agent, "prompt", &granted_tools(), EnforcePolicy::default()).unwrap();
        assert_eq!(result.status, StepStatus::Completed);
        assert_eq!(agent.invocations(), 1);
    }

    #[test]
    fn empty_tool_output_short_circuits_to_no_data() {
        let agent = ScriptedAgent::new("grounded", vec![outcome("answer", true, Some(json!([])))]);
        let result =
            enforce_step(&agent, "prompt", &granted_tools(), EnforcePolicy::default()).unwrap();
        assert_eq!(result.status, StepStatus::NoData);
        // Never retried: an empty tool result is terminal on the first attempt.
        assert_eq!(agent.invocations(), 1);
    }

    #[test]
    fn never_using_tools_exhausts_exactly_max_retries() {
        let agent = ScriptedAgent::new("stubborn", vec![outcome("from memory", false, None)]);
        let result =
            enforce_step(&agent, "prompt", &granted_tools(), EnforcePolicy { max_retries: 2 })
                .unwrap();
        assert_eq!(result.status, StepStatus::ToolNotUsed);
        assert_eq!(result.raw_text, "from memory");
        assert_eq!(agent.invocations(), 2);
    }

    #[test]
    fn retry_prompt_carries_corrective_instruction() {
        let agent = ScriptedAgent::new(
            "stubborn",
            vec![
                outcome("no tools here", false, None),
                outcome("fine", true, Some(json!("data"))),
            ],
        );
        let result =
            enforce_step(&agent, "base prompt", &granted_tools(), EnforcePolicy::default())
                .unwrap();
        assert_eq!(result.status, StepStatus::Completed);
        let prompts = agent.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("MUST use the provided tools"));
        assert!(prompts[1].starts_with("base prompt"));
        assert!(prompts[1].contains("MUST use the provided tools"));
    }

    #[test]
    fn empty_payload_classification() {
        assert!(is_empty_payload(None));
        assert!(is_empty_payload(Some(&Value::Null)));
        assert!(is_empty_payload(Some(&json!(""))));
        assert!(is_empty_payload(Some(&json!([]))));
        assert!(is_empty_payload(Some(&json!({}))));
        assert!(!is_empty_payload(Some(&json!(0))));
        assert!(!is_empty_payload(Some(&json!("n/a"))));
        assert!(!is_empty_payload(Some(&json!([null]))));
    }
}
