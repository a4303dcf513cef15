//! Supervisor routing: deterministic next-node selection.
//!
//! `decide` is pure state inspection: no model call, no side effects.
//! The driver applies the side effects (diagnostic message, iteration
//! counter) after the decision comes back. Priority order:
//!
//! 1. first pending directly-routable worker, in selection order
//! 2. verifier, once research output exists
//! 3. debate, when forced and participants are selected
//! 4. terminal (synthesis if selected, otherwise end)
//!
//! Loop prevention runs before any route is emitted: once the iteration
//! ceiling is reached or a candidate has exceeded its repeat-visit
//! threshold, the candidate is discarded and the decision falls through
//! to terminal handling.

use serde::{Deserialize, Serialize};

use crate::config::RunLimits;
use crate::state::OrchestrationState;
use crate::worker::{NodeId, WorkerRole};

/// Where the supervisor sends control next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    /// Dispatch one worker node.
    Worker(WorkerRole),
    /// Enter the debate sub-workflow.
    Debate,
    /// Terminal: run synthesis, then stop.
    Synthesize,
    /// Terminal: stop with whatever answer exists.
    End,
}

impl RouteTarget {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Synthesize | Self::End)
    }
}

impl std::fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Worker(role) => f.write_str(role.name()),
            Self::Debate => f.write_str("debate"),
            Self::Synthesize => f.write_str("synthesize"),
            Self::End => f.write_str("end"),
        }
    }
}

/// A routing decision with its human-readable justification, recorded in
/// the conversation as a diagnostic system message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub target: RouteTarget,
    pub reason: String,
}

/// Select the next node for the current state.
pub fn decide(state: &OrchestrationState, limits: &RunLimits) -> RouteDecision {
    let Some((target, reason)) = next_candidate(state) else {
        return terminal(state, "no pending workers".to_string());
    };

    // Loop prevention precedes every route.
    if state.iteration_count >= limits.max_iterations {
        return terminal(
            state,
            format!("iteration ceiling of {} reached", limits.max_iterations),
        );
    }
    let node = match target {
        RouteTarget::Worker(role) => NodeId::Role(role),
        RouteTarget::Debate => NodeId::Debate,
        // next_candidate never nominates a terminal target
        RouteTarget::Synthesize | RouteTarget::End => {
            return terminal(state, reason);
        }
    };
    if state.visits(node) > limits.history_threshold as usize {
        return terminal(
            state,
            format!(
                "'{}' exceeded the repeat-visit threshold of {}",
                node, limits.history_threshold
            ),
        );
    }

    RouteDecision { target, reason }
}

fn next_candidate(state: &OrchestrationState) -> Option<(RouteTarget, String)> {
    // 1. Pending workers in selection order.
    if let Some(role) = state
        .selected
        .iter()
        .copied()
        .find(|r| r.is_directly_routable() && !state.has_run(*r))
    {
        return Some((
            RouteTarget::Worker(role),
            format!("'{role}' is pending in selection order"),
        ));
    }

    // 2. Verifier, once at least one research-type worker has run.
    let research_ran = state
        .routing_history
        .iter()
        .any(|n| matches!(n, NodeId::Role(r) if r.is_research()));
    if state.selected.contains(&WorkerRole::Verifier)
        && !state.has_run(WorkerRole::Verifier)
        && research_ran
    {
        return Some((
            RouteTarget::Worker(WorkerRole::Verifier),
            "research output awaiting verification".to_string(),
        ));
    }

    // 3. Forced debate.
    if state.force_debate
        && state
            .selected
            .iter()
            .any(|r| r.is_debate_participant())
    {
        return Some((RouteTarget::Debate, "debate forced for this run".to_string()));
    }

    None
}

fn terminal(state: &OrchestrationState, reason: String) -> RouteDecision {
    let target = if state.selected.contains(&WorkerRole::Synthesis)
        && !state.has_run(WorkerRole::Synthesis)
    {
        RouteTarget::Synthesize
    } else {
        RouteTarget::End
    };
    RouteDecision { target, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(selected: Vec<WorkerRole>, force_debate: bool) -> OrchestrationState {
        OrchestrationState::new("query", selected, force_debate)
    }

    fn run_node(state: &mut OrchestrationState, node: NodeId) {
        state.routing_history.push(node);
    }

    #[test]
    fn test_selection_order_preserved() {
        let limits = RunLimits::default();
        let mut state = state_with(
            vec![
                WorkerRole::CaseLaw,
                WorkerRole::Quant,
                WorkerRole::Synthesis,
            ],
            false,
        );

        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::Worker(WorkerRole::CaseLaw));

        run_node(&mut state, NodeId::Role(WorkerRole::CaseLaw));
        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::Worker(WorkerRole::Quant));
    }

    #[test]
    fn test_verifier_waits_for_research() {
        let limits = RunLimits::default();
        let mut state = state_with(
            vec![WorkerRole::Quant, WorkerRole::Verifier, WorkerRole::Synthesis],
            false,
        );
        run_node(&mut state, NodeId::Role(WorkerRole::Quant));

        // Quant is not research-type, so the verifier is skipped.
        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::Synthesize);
    }

    #[test]
    fn test_verifier_after_research() {
        let limits = RunLimits::default();
        let mut state = state_with(
            vec![
                WorkerRole::Literature,
                WorkerRole::Verifier,
                WorkerRole::Synthesis,
            ],
            false,
        );
        run_node(&mut state, NodeId::Role(WorkerRole::Literature));

        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::Worker(WorkerRole::Verifier));

        run_node(&mut state, NodeId::Role(WorkerRole::Verifier));
        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::Synthesize);
    }

    #[test]
    fn test_forced_debate_routes_first_eligible_cycle() {
        let limits = RunLimits::default();
        let state = state_with(
            vec![
                WorkerRole::AdvocateA,
                WorkerRole::AdvocateB,
                WorkerRole::Arbiter,
            ],
            true,
        );
        // No directly routable workers selected, so debate is first.
        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::Debate);
    }

    #[test]
    fn test_debate_not_routed_without_flag() {
        let limits = RunLimits::default();
        let state = state_with(
            vec![WorkerRole::AdvocateA, WorkerRole::AdvocateB, WorkerRole::Arbiter],
            false,
        );
        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::End);
    }

    #[test]
    fn test_terminal_without_synthesis_ends() {
        let limits = RunLimits::default();
        let mut state = state_with(vec![WorkerRole::Quant], false);
        run_node(&mut state, NodeId::Role(WorkerRole::Quant));

        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::End);
    }

    #[test]
    fn test_iteration_ceiling_discards_candidate() {
        let limits = RunLimits {
            max_iterations: 2,
            ..Default::default()
        };
        let mut state = state_with(vec![WorkerRole::Quant, WorkerRole::Synthesis], false);
        state.iteration_count = 2;

        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::Synthesize);
        assert!(d.reason.contains("ceiling"));
    }

    #[test]
    fn test_repeat_visit_threshold_discards_candidate() {
        let limits = RunLimits {
            history_threshold: 1,
            ..Default::default()
        };
        let mut state = state_with(
            vec![
                WorkerRole::AdvocateA,
                WorkerRole::AdvocateB,
                WorkerRole::Arbiter,
            ],
            true,
        );
        // Debate already ran twice: over the threshold.
        run_node(&mut state, NodeId::Debate);
        run_node(&mut state, NodeId::Debate);

        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::End);
        assert!(d.reason.contains("threshold"));
    }

    #[test]
    fn test_synthesize_not_repeated() {
        let limits = RunLimits::default();
        let mut state = state_with(vec![WorkerRole::Synthesis], false);
        run_node(&mut state, NodeId::Role(WorkerRole::Synthesis));

        let d = decide(&state, &limits);
        assert_eq!(d.target, RouteTarget::End);
    }
}
