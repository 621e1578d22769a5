//! Step-executing capabilities.
//!
//! The orchestrator only needs one thing from a capability: execute a
//! resolved prompt, report the raw text, and say whether a tool was actually
//! invoked along the way. [`LmAgent`] is the production implementation,
//! backed by the configured completion command and a small single-tool-call
//! protocol. [`ScriptedAgent`] replays canned outcomes so the retry state
//! machine and the orchestrator stay unit-testable without a live model.
//!
//! Agents hold no per-run state. Attempt counters and tool-use flags live in
//! the enforcement wrapper's invocation scope, so one chain run's bookkeeping
//! can never leak into a concurrent run sharing the same agent.

use crate::error::StepError;
use crate::extract;
use crate::lm::CompletionCommand;
use crate::tools::Tool;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Maximum tool-call rounds inside one agent execution.
const MAX_TOOL_ROUNDS: usize = 3;

/// What one capability execution produced.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Raw generated text of the final completion.
    pub raw_text: String,
    /// Whether any granted tool was invoked during this execution.
    pub used_tool: bool,
    /// Output of the most recent tool invocation, if any.
    pub last_tool_output: Option<Value>,
}

/// An opaque executor of one step, optionally equipped with tools.
pub trait Agent: Send + Sync {
    /// Short role label used in logs ("city_recommender", "trip_classifier").
    fn role(&self) -> &str;

    /// Execute a resolved step description. `tools` is the step's grant; the
    /// agent decides whether to invoke any of them.
    fn execute(&self, prompt: &str, tools: &[Arc<dyn Tool>]) -> Result<StepOutcome, StepError>;
}

/// A tool-call directive the model may emit instead of a final answer.
#[derive(Debug, Deserialize)]
struct ToolDirective {
    tool: String,
    #[serde(default)]
    args: Value,
}

/// Production agent backed by the configured completion command.
pub struct LmAgent {
    role: String,
    goal: String,
    completion: CompletionCommand,
}

impl LmAgent {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        completion: CompletionCommand,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            completion,
        }
    }

    /// Render the tool roster and call protocol appended to tool-granted
    /// prompts.
    fn tool_protocol(tools: &[Arc<dyn Tool>]) -> String {
        let mut section = String::from("\n\n## Tools\nYou may ground your answer with:\n");
        for tool in tools {
            section.push_str(&format!("- `{}`: {}\n", tool.name(), tool.description()));
        }
        section.push_str(
            "\nTo call a tool, reply with only this JSON object and nothing else:\n\
             {\"tool\": \"<name>\", \"args\": {}}\n\
             Otherwise reply with your final answer.\n",
        );
        section
    }

    /// Interpret a completion as a tool-call directive, if it is one.
    fn parse_directive(text: &str) -> Option<ToolDirective> {
        let value = extract::extract(text).value()?.clone();
        if value.get("tool").is_none() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

impl Agent for LmAgent {
    fn role(&self) -> &str {
        &self.role
    }

    fn execute(&self, prompt: &str, tools: &[Arc<dyn Tool>]) -> Result<StepOutcome, StepError> {
        let preamble = format!("You are a {}. Your goal: {}\n\n", self.role, self.goal);

        if tools.is_empty() {
            let raw_text = self.completion.complete(&format!("{preamble}{prompt}"))?;
            return Ok(StepOutcome {
                raw_text,
                used_tool: false,
                last_tool_output: None,
            });
        }

        let mut transcript = format!("{preamble}{prompt}{}", Self::tool_protocol(tools));
        let mut used_tool = false;
        let mut last_tool_output = None;

        for round in 0..MAX_TOOL_ROUNDS {
            let raw_text = self.completion.complete(&transcript)?;
            let Some(directive) = Self::parse_directive(&raw_text) else {
                return Ok(StepOutcome {
                    raw_text,
                    used_tool,
                    last_tool_output,
                });
            };

            let Some(tool) = tools.iter().find(|t| t.name() == directive.tool) else {
                tracing::warn!(
                    role = self.role.as_str(),
                    tool = directive.tool.as_str(),
                    "unknown tool requested"
                );
                transcript.push_str(&format!(
                    "\n\nThere is no tool named `{}`. Answer with the tools listed or give \
                     your final answer.",
                    directive.tool
                ));
                continue;
            };

            // Tool failures are reported back to the model as text rather
            // than aborting the step; lookup tools are best-effort.
            let output = tool
                .run(&directive.args)
                .unwrap_or_else(|err| format!("tool error: {err}"));
            tracing::info!(
                role = self.role.as_str(),
                tool = tool.name(),
                round,
                output_bytes = output.len(),
                "tool invoked"
            );
            used_tool = true;
            last_tool_output = Some(
                serde_json::from_str(&output).unwrap_or_else(|_| Value::String(output.clone())),
            );
            transcript.push_str(&format!(
                "\n\nTool `{}` returned:\n{}\n\nUse this result. Reply with your final \
                 answer, or call another tool.",
                tool.name(),
                output
            ));
        }

        // Tool budget exhausted without a final answer; force one.
        let raw_text = self
            .completion
            .complete(&format!("{transcript}\n\nReply with your final answer now."))?;
        Ok(StepOutcome {
            raw_text,
            used_tool,
            last_tool_output,
        })
    }
}

/// Test agent replaying a fixed sequence of outcomes.
///
/// When the script runs out, the last outcome repeats, which is exactly what
/// a model that "never uses its tools" looks like to the retry machine.
pub struct ScriptedAgent {
    role: String,
    script: Mutex<VecDeque<StepOutcome>>,
    last: Mutex<Option<StepOutcome>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(role: impl Into<String>, outcomes: Vec<StepOutcome>) -> Self {
        Self {
            role: role.into(),
            script: Mutex::new(outcomes.into()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Outcomes that look like plain tool-free completions.
    pub fn completing(texts: &[&str]) -> Self {
        let outcomes = texts
            .iter()
            .map(|text| StepOutcome {
                raw_text: (*text).to_string(),
                used_tool: false,
                last_tool_output: None,
            })
            .collect();
        Self::new("scripted", outcomes)
    }

    /// Prompts observed so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }

    /// Number of times `execute` was called.
    pub fn invocations(&self) -> usize {
        self.prompts.lock().expect("prompt log poisoned").len()
    }
}

impl Agent for ScriptedAgent {
    fn role(&self) -> &str {
        &self.role
    }

    fn execute(&self, prompt: &str, _tools: &[Arc<dyn Tool>]) -> Result<StepOutcome, StepError> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());

        let mut script = self.script.lock().expect("script poisoned");
        let mut last = self.last.lock().expect("last outcome poisoned");
        if let Some(next) = script.pop_front() {
            *last = Some(next.clone());
            return Ok(next);
        }
        last.clone().ok_or_else(|| {
            StepError::Completion("scripted agent has no outcomes configured".to_string())
        })
    }
}
