//! Task-chain engine for LM-driven travel pipelines.
//!
//! The engine chains model invocations where each step's prompt can splice in
//! earlier raw outputs, enforces tool use with a bounded retry budget,
//! recovers JSON payloads from noisy generated text, and gates terminal
//! artifacts through structural and business-rule validation. Two built-in
//! pipelines (city recommendation and travel planning) wire it together; the
//! `tripchain` binary is a thin front end over them.

pub mod agent;
pub mod chain;
pub mod cli;
pub mod config;
pub mod enforce;
pub mod error;
pub mod extract;
pub mod lm;
pub mod orchestrator;
pub mod pipelines;
pub mod session;
mod templates;
pub mod tools;
pub mod validate;

pub use agent::{Agent, LmAgent, ScriptedAgent, StepOutcome};
pub use chain::{Chain, StepSpec};
pub use enforce::{enforce_step, EnforcePolicy};
pub use error::{ChainError, StepError};
pub use extract::{extract, ExtractedArtifact};
pub use lm::CompletionCommand;
pub use orchestrator::{run_chain, CancelToken, ChainContext, RunOptions, StepResult, StepStatus};
pub use pipelines::{city_pipeline, plan_pipeline, Pipeline, PipelineOutcome, StageAgents};
pub use validate::{check_business_rules, check_structure, ArtifactSchema, ValidationResult};
