//! Deterministic orchestration core for a panel of analysis workers.
//!
//! One query flows through an assembled workflow: a rule-based supervisor
//! picks the next node each cycle, workers append their findings to a
//! shared append-only conversation, an optional adversarial debate stress
//! tests them, failures pass through a remediation decision, and a
//! synthesis pass folds everything into one final answer.
//!
//! The crate is model-agnostic: workers and the remediation policy are
//! opaque async trait objects supplied by the caller. Everything the core
//! itself does (routing, state merging, loop prevention, verdict and
//! decision parsing) is deterministic and fully testable offline.
//!
//! # Structure
//!
//! - [`worker`]: the closed role set, the [`worker::Worker`] trait, and
//!   the registry workflows are assembled from
//! - [`state`]: the per-run conversation store and the `StateUpdate`
//!   deltas every node returns
//! - [`router`]: the supervisor's pure next-node decision
//! - [`debate`]: the bounded AdvocateA → AdvocateB → Arbiter sub-workflow
//! - [`remediation`]: retry/fallback/abort handling after worker failures
//! - [`workflow`]: the assembler and the sequential driver loop

pub mod config;
pub mod debate;
pub mod error;
pub mod parse;
pub mod remediation;
pub mod router;
pub mod state;
pub mod worker;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the assembly and run surface
pub use config::RunLimits;
pub use error::{OrchestrationError, WorkerError};
pub use workflow::{
    is_legal_transition, RunOutcome, StepNode, TransitionRecord, Workflow, WorkflowBuilder,
};

// Re-export the types callers implement against
pub use remediation::{
    RemediationAction, RemediationContext, RemediationDecision, RemediationPolicy,
    StaticRemediation,
};
pub use state::{Message, OrchestrationState, Role, SourceCitation, StateUpdate};
pub use worker::{NodeId, Worker, WorkerOutput, WorkerRegistry, WorkerRole};

// Re-export the debate surface
pub use debate::{ArbiterVerdict, DebateSubWorkflow};
pub use router::{decide, RouteDecision, RouteTarget};
