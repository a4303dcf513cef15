//! Remediation: retry/fallback/abort decisions after a worker failure.
//!
//! The policy behind the decision is external (usually model-backed); the
//! core's contract with it is narrow: hand over the failure context, get
//! back raw text, and parse exactly one of three actions out of it.
//! Unparseable output degrades to `fallback`; returning control to the
//! supervisor can never deadlock, aborting or retrying blindly could.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::WorkerError;
use crate::parse::extract_json_object;

/// The three actions a policy may choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    /// Re-run the failed worker with rephrased arguments.
    Rephrase,
    /// Return control to the supervisor, which picks a different worker.
    Fallback,
    /// End the run with an explicit abort notice.
    Abort,
}

impl std::fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rephrase => f.write_str("rephrase"),
            Self::Fallback => f.write_str("fallback"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

/// A parsed policy decision, stored in the run state and consumed by the
/// edge that follows the remediation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationDecision {
    pub action: RemediationAction,
    #[serde(default)]
    pub reason: Option<String>,
    /// Rephrased arguments for the failed worker (rephrase only).
    #[serde(default)]
    pub new_args: Option<Value>,
    /// Suggested alternative target (fallback only, advisory).
    #[serde(default)]
    pub new_target: Option<String>,
}

impl RemediationDecision {
    /// The safe default applied to unusable policy output.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            action: RemediationAction::Fallback,
            reason: Some(reason.into()),
            new_args: None,
            new_target: None,
        }
    }
}

/// Failure context handed to the policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationContext {
    pub failed_worker: String,
    pub error_message: String,
    /// The original task the run is trying to complete.
    pub task: String,
}

/// The external decision policy. Returns raw text; the core parses it.
#[async_trait]
pub trait RemediationPolicy: Send + Sync {
    async fn decide(&self, ctx: &RemediationContext) -> Result<String, WorkerError>;
}

/// Parse raw policy output. Anything without a usable `action` degrades
/// to `fallback`.
pub fn parse_decision(raw: &str) -> RemediationDecision {
    let parsed = extract_json_object(raw).and_then(|value| {
        value.get("action")?;
        serde_json::from_value::<RemediationDecision>(value).ok()
    });
    match parsed {
        Some(decision) => decision,
        None => {
            warn!(raw_len = raw.len(), "unusable remediation output, defaulting to fallback");
            RemediationDecision::fallback("policy output carried no usable decision")
        }
    }
}

/// Fixed-action policy for wiring tests and degraded (no-model) runs.
pub struct StaticRemediation {
    pub action: RemediationAction,
}

impl StaticRemediation {
    pub fn new(action: RemediationAction) -> Self {
        Self { action }
    }
}

#[async_trait]
impl RemediationPolicy for StaticRemediation {
    async fn decide(&self, _ctx: &RemediationContext) -> Result<String, WorkerError> {
        Ok(serde_json::json!({ "action": self.action, "reason": "static policy" }).to_string())
    }
}
