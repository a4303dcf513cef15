//! The conversation store and the single mutable run state.
//!
//! `OrchestrationState` is created once per query and threaded through
//! every step by the driver. Nodes never mutate it directly: each returns
//! a `StateUpdate` delta that the driver merges, so every mutation passes
//! through one place. Messages are append-only and never reordered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkerError;
use crate::remediation::RemediationDecision;
use crate::worker::{NodeId, WorkerRole};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Ai,
    System,
}

/// One entry in the shared conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Optional structured payload (tool activity, citation blocks).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
            payload: None,
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
            payload: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether this message is in-progress tool activity rather than a
    /// completed output. Such messages are filtered out of the synthesis
    /// view to bound its context.
    pub fn is_tool_activity(&self) -> bool {
        self.payload
            .as_ref()
            .is_some_and(|p| p.get("tool_calls").is_some())
    }
}

/// Citation metadata reported by a worker, keyed by URL in the run state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl SourceCitation {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: None,
        }
    }
}

/// The single mutable record for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationState {
    /// Append-only conversation history all workers read.
    pub messages: Vec<Message>,
    /// Ordered worker selection, immutable for the run's lifetime.
    pub selected: Vec<WorkerRole>,
    /// Whether this run must pass through the debate sub-workflow.
    pub force_debate: bool,
    /// Nodes that have actually executed, in order.
    pub routing_history: Vec<NodeId>,
    /// Incremented once per routing decision cycle.
    pub iteration_count: u32,
    /// Citations deduplicated by URL.
    pub sources: BTreeMap<String, SourceCitation>,
    /// Rounds completed in the current debate entry (resets on entry).
    pub debate_round: u32,
    /// Debate entries across the whole run.
    pub debate_count: u32,
    /// Set by a failing node, cleared by the next successful one.
    pub last_error: Option<WorkerError>,
    /// Set by remediation, consumed by the edge that follows it.
    pub remediation: Option<RemediationDecision>,
    /// Empty until synthesis runs or the run aborts.
    pub final_answer: String,
}

impl OrchestrationState {
    pub fn new(query: &str, selected: Vec<WorkerRole>, force_debate: bool) -> Self {
        Self {
            messages: vec![Message::human(query)],
            selected,
            force_debate,
            routing_history: Vec::new(),
            iteration_count: 0,
            sources: BTreeMap::new(),
            debate_round: 0,
            debate_count: 0,
            last_error: None,
            remediation: None,
            final_answer: String::new(),
        }
    }

    /// How many times a node has executed.
    pub fn visits(&self, node: NodeId) -> usize {
        self.routing_history.iter().filter(|n| **n == node).count()
    }

    pub fn has_run(&self, role: WorkerRole) -> bool {
        self.visits(NodeId::Role(role)) > 0
    }

    /// The first human message, which is the original query.
    pub fn original_query(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::Human)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Insert a source; re-adding an existing URL is a no-op.
    pub fn add_source(&mut self, source: SourceCitation) {
        self.sources.entry(source.url.clone()).or_insert(source);
    }

    /// Merge a node's delta. Messages append, counters move forward,
    /// optional fields overwrite.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(node) = update.executed {
            self.routing_history.push(node);
        }
        for source in update.sources {
            self.add_source(source);
        }
        if update.clear_error {
            self.last_error = None;
        }
        if let Some(err) = update.set_error {
            self.last_error = Some(err);
        }
        if let Some(decision) = update.remediation {
            self.remediation = Some(decision);
        }
        if let Some(round) = update.debate_round {
            self.debate_round = round;
        }
        if update.debate_entered {
            self.debate_count += 1;
        }
        if let Some(answer) = update.final_answer {
            self.final_answer = answer;
        }
    }
}

/// Delta returned by a node invocation.
///
/// `set_error` wins over `clear_error` when both are present, so a node
/// can unconditionally clear the previous failure and then record its own.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub executed: Option<NodeId>,
    pub sources: Vec<SourceCitation>,
    pub set_error: Option<WorkerError>,
    pub clear_error: bool,
    pub remediation: Option<RemediationDecision>,
    pub debate_round: Option<u32>,
    pub debate_entered: bool,
    pub final_answer: Option<String>,
}
