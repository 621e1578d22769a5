//! Sequential chain execution.
//!
//! Steps run strictly in order because each prompt is a function of earlier
//! raw outputs (a true data dependency). All run state — the context, the
//! collected results, the enforcement bookkeeping — is local to one call of
//! [`run_chain`], so a chain can be executed concurrently from multiple
//! threads over the same shared agents.

use crate::chain::{resolve_template, Chain};
use crate::enforce::{enforce_step, EnforcePolicy};
use crate::error::{ChainError, StepError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Terminal status of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step produced an answer (tool-grounded where required).
    Completed,
    /// A tool ran but reported nothing; "nothing to report", not a failure.
    NoData,
    /// The retry budget ran out without tool use; the caller decides whether
    /// a tool-free answer is acceptable.
    ToolNotUsed,
}

/// Raw output and terminal status of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub raw_text: String,
    pub status: StepStatus,
}

/// Ordered raw outputs of completed steps, used to resolve later templates.
/// Append-only and contiguous from index 0.
#[derive(Debug, Default)]
pub struct ChainContext {
    outputs: Vec<String>,
}

impl ChainContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, raw_text: String) {
        self.outputs.push(raw_text);
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.outputs.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub(crate) fn outputs(&self) -> &[String] {
        &self.outputs
    }
}

/// Cooperative cancellation flag, checked between steps.
///
/// Mid-step cancellation of an in-flight completion is best-effort and not
/// attempted here; step granularity keeps the contract simple.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-run execution options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub enforce: EnforcePolicy,
    pub cancel: CancelToken,
}

/// Execute every step of a validated chain in order.
///
/// Each step's template is resolved against the raw outputs collected so
/// far, executed under the enforcement wrapper, and its raw text appended to
/// the context. No step is retried once the run has advanced past it.
/// Execution-layer failures abort the remainder of the chain: later prompts
/// cannot be resolved without their dependency's text.
pub fn run_chain(chain: &Chain, options: &RunOptions) -> Result<Vec<StepResult>, ChainError> {
    let mut context = ChainContext::new();
    let mut results = Vec::with_capacity(chain.len());

    for (index, step) in chain.steps().iter().enumerate() {
        if options.cancel.is_cancelled() {
            return Err(ChainError::Aborted {
                at_index: index,
                cause: StepError::Cancelled,
            });
        }

        // The builder already rejected bad references; an unresolved index
        // here is an internal error, not a user error.
        let prompt = resolve_template(step.description_template(), context.outputs())
            .map_err(|cause| ChainError::Aborted { at_index: index, cause })?;

        tracing::info!(
            step = index,
            role = step.agent().role(),
            prompt_bytes = prompt.len(),
            "step started"
        );

        let result = enforce_step(step.agent(), &prompt, step.tools(), options.enforce)
            .map_err(|cause| ChainError::Aborted { at_index: index, cause })?;

        tracing::info!(step = index, status = ?result.status, "step finished");

        context.push(result.raw_text.clone());
        results.push(result);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, ScriptedAgent, StepOutcome};
    use crate::chain::{Chain, StepSpec};
    use crate::error::StepError;
    use crate::tools::Tool;
    use std::time::Duration;

    fn scripted_step(template: &str, agent: Arc<ScriptedAgent>) -> StepSpec {
        StepSpec::new(template, "any text", agent, Vec::new())
    }

    #[test]
    fn three_step_chain_threads_outputs_through_placeholders() {
        let recommend = Arc::new(ScriptedAgent::completing(&["CityA"]));
        let classify = Arc::new(ScriptedAgent::completing(&["Ideal"]));
        let justify = Arc::new(ScriptedAgent::completing(&["Because..."]));

        let chain = Chain::build(vec![
            scripted_step("Recommend a city", recommend.clone()),
            scripted_step("Classify: {{step_0_output}}", classify.clone()),
            scripted_step(
                "Why {{step_1_output}} given {{step_0_output}}",
                justify.clone(),
            ),
        ])
        .unwrap();

        let results = run_chain(&chain, &RunOptions::default()).unwrap();
        let outputs: Vec<&str> = results.iter().map(|r| r.raw_text.as_str()).collect();
        assert_eq!(outputs, vec!["CityA", "Ideal", "Because..."]);

        assert_eq!(classify.prompts(), vec!["Classify: CityA".to_string()]);
        let justify_prompt = &justify.prompts()[0];
        assert!(justify_prompt.contains("Ideal"));
        assert!(justify_prompt.contains("CityA"));
    }

    #[test]
    fn completion_failure_aborts_with_step_index() {
        struct FailingAgent;
        impl Agent for FailingAgent {
            fn role(&self) -> &str {
                "failing"
            }
            fn execute(
                &self,
                _prompt: &str,
                _tools: &[Arc<dyn Tool>],
            ) -> Result<StepOutcome, StepError> {
                Err(StepError::Timeout(Duration::from_secs(5)))
            }
        }

        let chain = Chain::build(vec![
            scripted_step("First", Arc::new(ScriptedAgent::completing(&["ok"]))),
            StepSpec::new("Second", "any text", Arc::new(FailingAgent), Vec::new()),
            scripted_step("Third {{step_1_output}}", Arc::new(ScriptedAgent::completing(&["x"]))),
        ])
        .unwrap();

        match run_chain(&chain, &RunOptions::default()) {
            Err(ChainError::Aborted { at_index, cause }) => {
                assert_eq!(at_index, 1);
                assert!(matches!(cause, StepError::Timeout(_)));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_stops_before_next_step() {
        let first = Arc::new(ScriptedAgent::completing(&["ok"]));
        let second = Arc::new(ScriptedAgent::completing(&["never"]));
        let chain = Chain::build(vec![
            scripted_step("First", first),
            scripted_step("Second", second.clone()),
        ])
        .unwrap();

        let options = RunOptions::default();
        options.cancel.cancel();

        match run_chain(&chain, &options) {
            Err(ChainError::Aborted { at_index, cause }) => {
                assert_eq!(at_index, 0);
                assert!(matches!(cause, StepError::Cancelled));
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(second.invocations(), 0);
    }

    #[test]
    fn chain_is_reusable_with_fresh_context_per_run() {
        let agent = Arc::new(ScriptedAgent::completing(&["one", "two"]));
        let chain = Chain::build(vec![scripted_step("Go", agent.clone())]).unwrap();

        let first = run_chain(&chain, &RunOptions::default()).unwrap();
        let second = run_chain(&chain, &RunOptions::default()).unwrap();
        assert_eq!(first[0].raw_text, "one");
        assert_eq!(second[0].raw_text, "two");
        assert_eq!(agent.invocations(), 2);
    }
}
