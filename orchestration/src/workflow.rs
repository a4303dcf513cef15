//! Workflow assembly and the sequential driver loop.
//!
//! The assembler resolves every selected role against the registry up
//! front, then the driver advances one node per routing cycle:
//! supervisor decision → worker / debate / remediation → back to the
//! supervisor, until a terminal decision. Every node call sits behind a
//! catch boundary that converts failures into state updates; nothing a
//! worker does can crash the run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::RunLimits;
use crate::debate::DebateSubWorkflow;
use crate::error::{OrchestrationError, WorkerError};
use crate::remediation::{
    parse_decision, RemediationAction, RemediationContext, RemediationPolicy,
};
use crate::router::{decide, RouteTarget};
use crate::state::{Message, OrchestrationState, Role, SourceCitation, StateUpdate};
use crate::worker::{NodeId, WorkerRegistry, WorkerRole};

/// A node in the assembled graph, as recorded in the run trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepNode {
    Supervisor,
    Worker(WorkerRole),
    Debate,
    Remediation,
    Terminal,
}

impl fmt::Display for StepNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supervisor => f.write_str("supervisor"),
            Self::Worker(role) => f.write_str(role.name()),
            Self::Debate => f.write_str("debate"),
            Self::Remediation => f.write_str("remediation"),
            Self::Terminal => f.write_str("terminal"),
        }
    }
}

/// Legal edges of the assembled graph:
///
/// ```text
/// supervisor  → worker | debate | terminal
/// worker      → supervisor | remediation   (synthesis → terminal only)
/// debate      → supervisor
/// remediation → worker (not synthesis) | supervisor | terminal
/// ```
///
/// The iteration ceiling can additionally force terminal from anywhere.
pub fn is_legal_transition(from: StepNode, to: StepNode) -> bool {
    use StepNode::*;
    match (from, to) {
        (Terminal, _) => false,
        (_, Terminal) => true,
        (Supervisor, Worker(_)) | (Supervisor, Debate) => true,
        (Worker(WorkerRole::Synthesis), _) => false,
        (Worker(_), Supervisor) | (Worker(_), Remediation) => true,
        (Debate, Supervisor) => true,
        (Remediation, Worker(role)) => role != WorkerRole::Synthesis,
        (Remediation, Supervisor) => true,
        _ => false,
    }
}

/// A single recorded step transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: StepNode,
    pub to: StepNode,
    /// Routing cycle at the time of the transition.
    pub iteration: u32,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Transition log for one run. The entry node is the supervisor.
struct Trace {
    current: StepNode,
    records: Vec<TransitionRecord>,
}

impl Trace {
    fn new() -> Self {
        Self {
            current: StepNode::Supervisor,
            records: Vec::new(),
        }
    }

    fn advance(
        &mut self,
        to: StepNode,
        iteration: u32,
        reason: Option<&str>,
    ) -> Result<(), OrchestrationError> {
        if !is_legal_transition(self.current, to) {
            return Err(OrchestrationError::RoutingParse(format!(
                "illegal transition {} → {}",
                self.current, to
            )));
        }
        tracing::debug!(from = %self.current, to = %to, iteration, "step transition");
        self.records.push(TransitionRecord {
            from: self.current,
            to,
            iteration,
            at: Utc::now(),
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }
}

/// What a finished run hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub final_answer: String,
    /// Executed nodes in order.
    pub routing_history: Vec<String>,
    /// Citations deduplicated by URL.
    pub sources: BTreeMap<String, SourceCitation>,
    pub iterations: u32,
    pub debate_count: u32,
    pub trace: Vec<TransitionRecord>,
}

/// Assembles a `Workflow` over a worker subset.
pub struct WorkflowBuilder {
    registry: WorkerRegistry,
    limits: RunLimits,
}

impl WorkflowBuilder {
    pub fn new(registry: WorkerRegistry) -> Self {
        Self {
            registry,
            limits: RunLimits::default(),
        }
    }

    pub fn limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Assemble a workflow over the selected roles.
    ///
    /// Every selected role must resolve in the registry now; when any
    /// debate participant is selected, all three must resolve, because
    /// the participants collapse into a single debate node. There is no
    /// call-time lookup.
    pub fn build(
        self,
        selected: Vec<WorkerRole>,
        remediation: Arc<dyn RemediationPolicy>,
    ) -> Result<Workflow, OrchestrationError> {
        let mut unique: Vec<WorkerRole> = Vec::new();
        for role in selected {
            if !unique.contains(&role) {
                unique.push(role);
            }
        }

        for role in unique.iter().filter(|r| !r.is_debate_participant()) {
            if !self.registry.contains(*role) {
                return Err(OrchestrationError::UnregisteredWorker(*role));
            }
        }
        if unique.iter().any(|r| r.is_debate_participant()) {
            for role in DebateSubWorkflow::PARTICIPANTS {
                if !self.registry.contains(role) {
                    return Err(OrchestrationError::UnregisteredWorker(role));
                }
            }
        }

        Ok(Workflow {
            registry: self.registry,
            limits: self.limits,
            selected: unique,
            remediation,
        })
    }
}

enum RemediationOutcome {
    /// Re-run the failed worker next cycle.
    Retry(WorkerRole),
    /// Return control to the supervisor next cycle.
    Resume,
    /// End the run with this notice.
    Abort(String),
}

/// The assembled state machine for one worker subset, reusable across
/// queries. Each `run` owns an independent `OrchestrationState`.
pub struct Workflow {
    registry: WorkerRegistry,
    limits: RunLimits,
    selected: Vec<WorkerRole>,
    remediation: Arc<dyn RemediationPolicy>,
}

impl Workflow {
    pub fn selected(&self) -> &[WorkerRole] {
        &self.selected
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Drive the run to a terminal state. Never returns an error: every
    /// failure mode ends as explanatory text in the final answer.
    pub async fn run(&self, query: &str, force_debate: bool) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let mut state = OrchestrationState::new(query, self.selected.clone(), force_debate);
        let mut trace = Trace::new();
        let mut retry_target: Option<WorkerRole> = None;
        info!(%run_id, selected = ?self.selected, force_debate, "run started");

        loop {
            // The ceiling binds regardless of any other state.
            if state.iteration_count >= self.limits.max_iterations {
                self.halt(&mut state, &mut trace, "iteration ceiling reached");
                break;
            }
            state.iteration_count += 1;

            // Failure path: a failed node hands control to remediation.
            if state.last_error.is_some() {
                if let Err(e) =
                    trace.advance(StepNode::Remediation, state.iteration_count, Some("worker failure"))
                {
                    self.fail_safe(&mut state, &mut trace, &e.to_string());
                    break;
                }
                match self.remediation_cycle(&mut state).await {
                    RemediationOutcome::Retry(role) => {
                        retry_target = Some(role);
                        continue;
                    }
                    RemediationOutcome::Resume => {
                        if let Err(e) = trace.advance(
                            StepNode::Supervisor,
                            state.iteration_count,
                            Some("remediation resumed routing"),
                        ) {
                            self.fail_safe(&mut state, &mut trace, &e.to_string());
                            break;
                        }
                        continue;
                    }
                    RemediationOutcome::Abort(notice) => {
                        state.apply(StateUpdate {
                            messages: vec![Message::system(notice.clone())],
                            final_answer: Some(notice),
                            ..Default::default()
                        });
                        let _ = trace.advance(
                            StepNode::Terminal,
                            state.iteration_count,
                            Some("remediation abort"),
                        );
                        break;
                    }
                }
            }

            // Rephrase redirect: skip the supervisor, re-run the failed worker.
            if let Some(role) = retry_target.take() {
                if let Err(e) = trace.advance(
                    StepNode::Worker(role),
                    state.iteration_count,
                    Some("remediation rephrase"),
                ) {
                    self.fail_safe(&mut state, &mut trace, &e.to_string());
                    break;
                }
                let update = self.worker_cycle(role, &state).await;
                let failed = update.set_error.is_some();
                state.apply(update);
                if !failed {
                    if let Err(e) = trace.advance(
                        StepNode::Supervisor,
                        state.iteration_count,
                        Some("retried worker complete"),
                    ) {
                        self.fail_safe(&mut state, &mut trace, &e.to_string());
                        break;
                    }
                }
                continue;
            }

            // Normal path: one supervisor decision per cycle.
            let decision = decide(&state, &self.limits);
            state.apply(StateUpdate {
                messages: vec![Message::system(format!(
                    "Supervisor: routing to '{}' ({})",
                    decision.target, decision.reason
                ))],
                ..Default::default()
            });
            info!(
                target = %decision.target,
                reason = %decision.reason,
                iteration = state.iteration_count,
                "routing decision"
            );

            match decision.target {
                RouteTarget::Worker(role) => {
                    if let Err(e) = trace.advance(
                        StepNode::Worker(role),
                        state.iteration_count,
                        Some(decision.reason.as_str()),
                    ) {
                        self.fail_safe(&mut state, &mut trace, &e.to_string());
                        break;
                    }
                    let update = self.worker_cycle(role, &state).await;
                    let failed = update.set_error.is_some();
                    state.apply(update);
                    if !failed {
                        if let Err(e) = trace.advance(
                            StepNode::Supervisor,
                            state.iteration_count,
                            Some("worker complete"),
                        ) {
                            self.fail_safe(&mut state, &mut trace, &e.to_string());
                            break;
                        }
                    }
                }
                RouteTarget::Debate => {
                    if let Err(e) = trace.advance(
                        StepNode::Debate,
                        state.iteration_count,
                        Some(decision.reason.as_str()),
                    ) {
                        self.fail_safe(&mut state, &mut trace, &e.to_string());
                        break;
                    }
                    let update = DebateSubWorkflow::new(&self.registry, &self.limits)
                        .run(&state)
                        .await;
                    state.apply(update);
                    if let Err(e) = trace.advance(
                        StepNode::Supervisor,
                        state.iteration_count,
                        Some("debate complete"),
                    ) {
                        self.fail_safe(&mut state, &mut trace, &e.to_string());
                        break;
                    }
                }
                RouteTarget::Synthesize => {
                    if let Err(e) = trace.advance(
                        StepNode::Worker(WorkerRole::Synthesis),
                        state.iteration_count,
                        Some(decision.reason.as_str()),
                    ) {
                        self.fail_safe(&mut state, &mut trace, &e.to_string());
                        break;
                    }
                    let update = self.worker_cycle(WorkerRole::Synthesis, &state).await;
                    state.apply(update);
                    // Synthesis is terminal either way; it is never remediated.
                    let _ = trace.advance(
                        StepNode::Terminal,
                        state.iteration_count,
                        Some(decision.reason.as_str()),
                    );
                    break;
                }
                RouteTarget::End => {
                    let _ = trace.advance(
                        StepNode::Terminal,
                        state.iteration_count,
                        Some(decision.reason.as_str()),
                    );
                    break;
                }
            }
        }

        info!(
            %run_id,
            iterations = state.iteration_count,
            history = ?state.routing_history,
            "run finished"
        );
        RunOutcome {
            run_id,
            final_answer: state.final_answer.clone(),
            routing_history: state
                .routing_history
                .iter()
                .map(ToString::to_string)
                .collect(),
            sources: state.sources,
            iterations: state.iteration_count,
            debate_count: state.debate_count,
            trace: trace.records,
        }
    }

    /// Invoke one worker behind the catch boundary.
    async fn worker_cycle(&self, role: WorkerRole, state: &OrchestrationState) -> StateUpdate {
        let Some(worker) = self.registry.get(role) else {
            // Resolved at build time; missing here means bookkeeping corruption.
            return Self::failure_update(role, WorkerError::new(role, "not present in the registry"));
        };

        let view: Vec<Message> = if role == WorkerRole::Synthesis {
            synthesis_view(&state.messages)
        } else {
            state.messages.clone()
        };

        match worker.invoke(&view).await {
            Ok(output) => {
                info!(
                    worker = %role,
                    messages = output.messages.len(),
                    sources = output.sources.len(),
                    "worker complete"
                );
                let final_answer = (role == WorkerRole::Synthesis).then(|| {
                    output
                        .messages
                        .iter()
                        .rev()
                        .find(|m| m.role == Role::Ai && !m.content.trim().is_empty())
                        .map(|m| m.content.clone())
                        .unwrap_or_else(|| "Synthesis produced no answer.".to_string())
                });
                StateUpdate {
                    messages: output.messages,
                    executed: Some(NodeId::Role(role)),
                    sources: output.sources,
                    clear_error: true,
                    final_answer,
                    ..Default::default()
                }
            }
            Err(err) => {
                error!(worker = %role, error = %err, "worker failed");
                Self::failure_update(role, err)
            }
        }
    }

    /// Failure delta: the error is recorded, the node still enters the
    /// routing history so loop prevention stays honest.
    fn failure_update(role: WorkerRole, err: WorkerError) -> StateUpdate {
        let final_answer = (role == WorkerRole::Synthesis).then(|| {
            format!(
                "Synthesis failed: {}. Partial findings remain in the conversation log.",
                err.message
            )
        });
        StateUpdate {
            messages: vec![Message::system(err.to_string())],
            executed: Some(NodeId::Role(role)),
            set_error: Some(err),
            final_answer,
            ..Default::default()
        }
    }

    /// One remediation decision. The policy may not loop on itself: any
    /// failure here ends the run.
    async fn remediation_cycle(&self, state: &mut OrchestrationState) -> RemediationOutcome {
        let Some(err) = state.last_error.clone() else {
            return RemediationOutcome::Abort(
                "Run halted: remediation entered without a recorded failure.".to_string(),
            );
        };

        let ctx = RemediationContext {
            failed_worker: err.worker.to_string(),
            error_message: err.message.clone(),
            task: state.original_query().to_string(),
        };
        let raw = match self.remediation.decide(&ctx).await {
            Ok(raw) => raw,
            Err(policy_err) => {
                error!(error = %policy_err, "remediation policy failed");
                return RemediationOutcome::Abort(format!(
                    "Run halted: remediation failed after '{}' error ({}).",
                    err.worker, err.message
                ));
            }
        };

        let decision = parse_decision(&raw);
        info!(action = %decision.action, worker = %err.worker, "remediation decision");

        let note = match decision.action {
            RemediationAction::Rephrase => match &decision.new_args {
                Some(args) => format!(
                    "Remediation: retry '{}' with rephrased arguments: {args}",
                    err.worker
                ),
                None => format!("Remediation: retry '{}'", err.worker),
            },
            RemediationAction::Fallback => {
                format!("Remediation: fall back from '{}' to the supervisor", err.worker)
            }
            RemediationAction::Abort => {
                format!("Remediation: abort after failure in '{}'", err.worker)
            }
        };
        state.apply(StateUpdate {
            messages: vec![Message::system(note)],
            remediation: Some(decision.clone()),
            clear_error: true,
            ..Default::default()
        });

        match decision.action {
            // Synthesis is never retried through remediation.
            RemediationAction::Rephrase if err.worker != WorkerRole::Synthesis => {
                RemediationOutcome::Retry(err.worker)
            }
            RemediationAction::Rephrase | RemediationAction::Fallback => RemediationOutcome::Resume,
            RemediationAction::Abort => RemediationOutcome::Abort(format!(
                "Run aborted after unrecoverable failure in '{}': {}",
                err.worker, err.message
            )),
        }
    }

    /// Forced terminal: the ceiling or a bound was hit before synthesis.
    fn halt(&self, state: &mut OrchestrationState, trace: &mut Trace, why: &str) {
        info!(why, "run forced terminal");
        state.messages.push(Message::system(format!("Run halted: {why}")));
        if state.final_answer.is_empty() {
            state.final_answer = format!(
                "The run ended before synthesis: {why}. Partial findings remain in the conversation log."
            );
        }
        let _ = trace.advance(StepNode::Terminal, state.iteration_count, Some(why));
    }

    /// Fail-safe for bookkeeping faults the graph cannot express. Should
    /// not occur; converts into a terminal state instead of propagating.
    fn fail_safe(&self, state: &mut OrchestrationState, trace: &mut Trace, why: &str) {
        error!(why, "routing bookkeeping fault");
        state.messages.push(Message::system(format!("Run halted: {why}")));
        if state.final_answer.is_empty() {
            state.final_answer = format!("The run halted early: {why}");
        }
        let _ = trace.advance(StepNode::Terminal, state.iteration_count, Some(why));
    }
}

/// Conversation view handed to synthesis: human queries and completed
/// assistant outputs only, without routing diagnostics or tool activity.
fn synthesis_view(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| match m.role {
            Role::Human => true,
            Role::Ai => !m.is_tool_activity(),
            Role::System => false,
        })
        .cloned()
        .collect()
}
