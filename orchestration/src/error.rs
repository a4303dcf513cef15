//! Error taxonomy for the orchestration core.
//!
//! No worker error is allowed to escape the driver loop: node failures are
//! converted into state updates and surfaced as text in the final answer.
//! The types here exist so every catch boundary converts into the same
//! structured shapes instead of stringly-typed ad-hoc errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::worker::WorkerRole;

/// Structured description of a failed worker invocation.
///
/// Carried in `OrchestrationState::last_error` and consumed by the
/// remediation component.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("worker '{worker}' failed: {message}")]
pub struct WorkerError {
    /// The worker whose invocation failed.
    pub worker: WorkerRole,
    /// Human-readable failure description (never a stack trace).
    pub message: String,
}

impl WorkerError {
    pub fn new(worker: WorkerRole, message: impl Into<String>) -> Self {
        Self {
            worker,
            message: message.into(),
        }
    }
}

/// Failures the core itself can report.
///
/// Only `UnregisteredWorker` and `UnknownRole` reach callers (at assembly
/// time); the rest classify internal fail-safe paths.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// The core could not interpret its own bookkeeping. Should not occur;
    /// converted into a terminal state rather than propagated.
    #[error("routing bookkeeping could not be interpreted: {0}")]
    RoutingParse(String),

    /// The remediation policy itself failed or gave an unusable decision.
    #[error("remediation policy failed: {0}")]
    Remediation(String),

    /// The arbiter verdict could not be parsed (defaults the debate to stop).
    #[error("arbiter verdict could not be parsed: {0}")]
    DebateParse(String),

    /// A selected worker did not resolve in the registry at build time.
    #[error("worker '{0}' was selected but is not registered")]
    UnregisteredWorker(WorkerRole),

    /// A worker name from the outside world does not map to a known role.
    #[error("unknown worker role '{0}'")]
    UnknownRole(String),
}
