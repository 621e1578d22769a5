//! Error taxonomy for chain construction and execution.
//!
//! Only execution-layer failures of the completion capability abort a chain;
//! step-local problems (parse failures, missing fields) are recovered into
//! result values and surfaced to the caller for display.

use std::time::Duration;
use thiserror::Error;

/// Fatal chain-level failures.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Build-time rejection: a template references a step at or after its
    /// own position, or an index with no step at all.
    #[error("malformed chain: {0}")]
    Malformed(String),

    /// A step's execution failed in a way no later step can recover from.
    #[error("chain aborted at step {at_index}: {cause}")]
    Aborted {
        at_index: usize,
        #[source]
        cause: StepError,
    },
}

/// Execution-layer failures local to one step.
#[derive(Debug, Error)]
pub enum StepError {
    /// The completion command exceeded its wall-clock budget.
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    /// The completion command could not be spawned or exited non-zero.
    #[error("completion failed: {0}")]
    Completion(String),

    /// A placeholder referenced an index absent from the chain context.
    /// The builder rejects these, so hitting this at run time is a bug.
    #[error("unresolved placeholder {{{{step_{0}_output}}}}")]
    UnresolvedPlaceholder(usize),

    /// The run was cancelled before this step started.
    #[error("chain run cancelled")]
    Cancelled,
}
