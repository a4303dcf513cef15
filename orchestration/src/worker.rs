//! Worker roles, the opaque worker interface, and the registry.
//!
//! Workers are capability units the core knows nothing about beyond their
//! role and the `Worker` contract: conversation in, messages and optional
//! source citations out. Roles form a closed enum so dispatch is resolved
//! against the registry at assembly time, never by name at call time.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestrationError, WorkerError};
use crate::state::{Message, SourceCitation};

/// The closed set of panel roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    /// Academic literature research.
    Literature,
    /// Quantitative computation (concentration indices, simulations).
    Quant,
    /// Model caveats and derivation explanations.
    Explainer,
    /// Market definition analysis.
    MarketDef,
    /// Uploaded document analysis.
    DocAnalyzer,
    /// Legal precedent lookup.
    CaseLaw,
    /// Citation and fact verification.
    Verifier,
    /// Final answer synthesis.
    Synthesis,
    /// Debate advocate arguing the affirmative side.
    AdvocateA,
    /// Debate advocate arguing the opposing side.
    AdvocateB,
    /// Debate arbiter emitting the continuation verdict.
    Arbiter,
}

impl WorkerRole {
    pub fn all() -> &'static [WorkerRole] {
        &[
            Self::Literature,
            Self::Quant,
            Self::Explainer,
            Self::MarketDef,
            Self::DocAnalyzer,
            Self::CaseLaw,
            Self::Verifier,
            Self::Synthesis,
            Self::AdvocateA,
            Self::AdvocateB,
            Self::Arbiter,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Literature => "literature",
            Self::Quant => "quant",
            Self::Explainer => "explainer",
            Self::MarketDef => "market_def",
            Self::DocAnalyzer => "doc_analyzer",
            Self::CaseLaw => "case_law",
            Self::Verifier => "verifier",
            Self::Synthesis => "synthesis",
            Self::AdvocateA => "advocate_a",
            Self::AdvocateB => "advocate_b",
            Self::Arbiter => "arbiter",
        }
    }

    /// Whether this role runs inside the debate sub-workflow rather than
    /// as a standalone node.
    pub fn is_debate_participant(self) -> bool {
        matches!(self, Self::AdvocateA | Self::AdvocateB | Self::Arbiter)
    }

    /// Research-type roles whose output gates the verifier.
    pub fn is_research(self) -> bool {
        matches!(self, Self::Literature | Self::CaseLaw)
    }

    /// Roles the supervisor schedules in selection order. Synthesis,
    /// verifier, and debate participants are held back for later phases.
    pub fn is_directly_routable(self) -> bool {
        !matches!(self, Self::Synthesis | Self::Verifier) && !self.is_debate_participant()
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WorkerRole {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkerRole::all()
            .iter()
            .copied()
            .find(|role| role.name() == s)
            .ok_or_else(|| OrchestrationError::UnknownRole(s.to_string()))
    }
}

/// Identity of an executed node as recorded in the routing history.
/// Debate participants collapse into the single `Debate` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Role(WorkerRole),
    Debate,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role(role) => f.write_str(role.name()),
            Self::Debate => f.write_str("debate"),
        }
    }
}

/// What a worker hands back on success.
#[derive(Debug, Clone, Default)]
pub struct WorkerOutput {
    /// Messages to append to the shared conversation.
    pub messages: Vec<Message>,
    /// Source citations reported by the worker, merged by URL.
    pub sources: Vec<SourceCitation>,
}

impl WorkerOutput {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            sources: Vec::new(),
        }
    }
}

/// The opaque capability unit the core invokes.
///
/// Implementations must either return a `WorkerOutput` or a `WorkerError`
/// the driver can convert into `last_error`; they must never panic on bad
/// model output.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn invoke(&self, history: &[Message]) -> Result<WorkerOutput, WorkerError>;
}

/// Role-to-capability map, resolved at workflow assembly time.
#[derive(Default, Clone)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerRole, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, role: WorkerRole, worker: Arc<dyn Worker>) {
        self.workers.insert(role, worker);
    }

    /// Builder-style registration.
    pub fn with(mut self, role: WorkerRole, worker: impl Worker + 'static) -> Self {
        self.register(role, Arc::new(worker));
        self
    }

    pub fn get(&self, role: WorkerRole) -> Option<Arc<dyn Worker>> {
        self.workers.get(&role).cloned()
    }

    pub fn contains(&self, role: WorkerRole) -> bool {
        self.workers.contains_key(&role)
    }

    pub fn roles(&self) -> Vec<WorkerRole> {
        let mut roles: Vec<WorkerRole> = self.workers.keys().copied().collect();
        roles.sort_by_key(|r| r.name());
        roles
    }
}
