//! Bounded adversarial debate: AdvocateA → AdvocateB → Arbiter.
//!
//! Invoked by the driver as a single opaque node. Each round is one fixed
//! pass through both advocates and the arbiter; the arbiter's continuation
//! verdict decides whether another round runs, but the configured round
//! cap always takes precedence over the arbiter's opinion. A role failure
//! is recorded as a system message and still counts the round, so the
//! sub-workflow terminates no matter what the models do.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RunLimits;
use crate::error::WorkerError;
use crate::parse::extract_json_object;
use crate::state::{Message, OrchestrationState, Role, StateUpdate};
use crate::worker::{NodeId, WorkerRegistry, WorkerRole};

/// Verdict embedded in the arbiter's free-form output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbiterVerdict {
    pub should_continue: bool,
    #[serde(default)]
    pub reason: Option<String>,
    /// Actionable instructions injected before the next round.
    #[serde(default)]
    pub feedback: Option<String>,
}

impl ArbiterVerdict {
    /// Safe default when no verdict can be parsed: stop the debate.
    pub fn stop() -> Self {
        Self {
            should_continue: false,
            reason: None,
            feedback: None,
        }
    }
}

/// Best-effort extraction of a verdict from arbiter prose. The object must
/// at least carry the continuation flag to count as a verdict.
pub fn parse_verdict(text: &str) -> Option<ArbiterVerdict> {
    let value = extract_json_object(text)?;
    value.get("should_continue")?;
    serde_json::from_value(value).ok()
}

/// The nested three-role cycle, borrowed from the driver for one entry.
pub struct DebateSubWorkflow<'a> {
    registry: &'a WorkerRegistry,
    round_limit: u32,
}

impl<'a> DebateSubWorkflow<'a> {
    /// Fixed speaking order within a round.
    pub const PARTICIPANTS: [WorkerRole; 3] = [
        WorkerRole::AdvocateA,
        WorkerRole::AdvocateB,
        WorkerRole::Arbiter,
    ];

    pub fn new(registry: &'a WorkerRegistry, limits: &RunLimits) -> Self {
        Self {
            registry,
            round_limit: limits.debate_round_limit,
        }
    }

    /// Run the debate to completion and return the delta for the driver.
    ///
    /// `debate_round` in the returned update is the round count for this
    /// entry; the entry counter increments via `debate_entered`.
    pub async fn run(&self, state: &OrchestrationState) -> StateUpdate {
        let mut transcript = state.messages.clone();
        let mut update = StateUpdate {
            executed: Some(NodeId::Debate),
            debate_entered: true,
            clear_error: true,
            ..Default::default()
        };
        let mut round = 0u32;

        loop {
            // The cap binds before the round runs, so a zero cap means no
            // advocate ever speaks.
            if round >= self.round_limit {
                break;
            }
            match self.run_round(&mut transcript, &mut update).await {
                Ok(verdict) => {
                    round += 1;
                    info!(
                        round,
                        should_continue = verdict.should_continue,
                        "debate round complete"
                    );
                    // The hard cap wins over the arbiter's opinion.
                    if verdict.should_continue && round < self.round_limit {
                        if let Some(feedback) =
                            verdict.feedback.filter(|f| !f.trim().is_empty())
                        {
                            let msg = Message::system(format!(
                                "Arbiter feedback for the next round: {feedback}"
                            ));
                            transcript.push(msg.clone());
                            update.messages.push(msg);
                        }
                        continue;
                    }
                    break;
                }
                Err(err) => {
                    // Record and stop; the round still counts so the cap holds.
                    round += 1;
                    warn!(error = %err, round, "debate role failed");
                    let msg = Message::system(format!("Debate halted: {err}"));
                    transcript.push(msg.clone());
                    update.messages.push(msg);
                    break;
                }
            }
        }

        update.debate_round = Some(round);
        update
    }

    /// One full AdvocateA → AdvocateB → Arbiter pass.
    async fn run_round(
        &self,
        transcript: &mut Vec<Message>,
        update: &mut StateUpdate,
    ) -> Result<ArbiterVerdict, WorkerError> {
        for role in [WorkerRole::AdvocateA, WorkerRole::AdvocateB] {
            self.speak(role, transcript, update).await?;
        }
        let arbiter_output = self.speak(WorkerRole::Arbiter, transcript, update).await?;

        let verdict = arbiter_output
            .iter()
            .rev()
            .filter(|m| m.role == Role::Ai)
            .find_map(|m| parse_verdict(&m.content))
            .unwrap_or_else(|| {
                warn!("arbiter emitted no parseable verdict, defaulting to stop");
                ArbiterVerdict::stop()
            });
        Ok(verdict)
    }

    /// Invoke one debate role and append its output to the transcript.
    async fn speak(
        &self,
        role: WorkerRole,
        transcript: &mut Vec<Message>,
        update: &mut StateUpdate,
    ) -> Result<Vec<Message>, WorkerError> {
        let worker = self
            .registry
            .get(role)
            .ok_or_else(|| WorkerError::new(role, "not registered"))?;
        let output = worker.invoke(transcript).await?;
        transcript.extend(output.messages.iter().cloned());
        update.messages.extend(output.messages.iter().cloned());
        update.sources.extend(output.sources);
        Ok(output.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{echo, failing, ScriptedWorker};

    fn debate_state() -> OrchestrationState {
        OrchestrationState::new(
            "Should below-cost pricing be presumed predatory?",
            DebateSubWorkflow::PARTICIPANTS.to_vec(),
            true,
        )
    }

    fn registry_with_arbiter(arbiter: ScriptedWorker) -> WorkerRegistry {
        WorkerRegistry::new()
            .with(WorkerRole::AdvocateA, echo(WorkerRole::AdvocateA, "affirmative argument"))
            .with(WorkerRole::AdvocateB, echo(WorkerRole::AdvocateB, "opposing argument"))
            .with(WorkerRole::Arbiter, arbiter)
    }

    #[tokio::test]
    async fn test_single_round_on_stop_verdict() {
        let registry = registry_with_arbiter(ScriptedWorker::replies(vec![
            r#"Both sides covered. {"should_continue": false, "reason": "consensus"}"#.into(),
        ]));
        let limits = RunLimits::default();
        let state = debate_state();

        let update = DebateSubWorkflow::new(&registry, &limits).run(&state).await;
        assert_eq!(update.debate_round, Some(1));
        assert!(update.debate_entered);
        // A, B, arbiter: one message each.
        assert_eq!(update.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_continue_then_stop_runs_two_rounds() {
        let registry = registry_with_arbiter(ScriptedWorker::replies(vec![
            r#"{"should_continue": true, "feedback": "address the recoupment question"}"#.into(),
            r#"{"should_continue": false}"#.into(),
        ]));
        let limits = RunLimits::default();
        let state = debate_state();

        let update = DebateSubWorkflow::new(&registry, &limits).run(&state).await;
        assert_eq!(update.debate_round, Some(2));
        // Round 1 (3) + feedback (1) + round 2 (3).
        assert_eq!(update.messages.len(), 7);
        assert!(update
            .messages
            .iter()
            .any(|m| m.role == Role::System && m.content.contains("recoupment")));
    }

    #[tokio::test]
    async fn test_round_cap_overrides_arbiter() {
        // Arbiter always wants more debate.
        let registry = registry_with_arbiter(ScriptedWorker::repeating(
            r#"{"should_continue": true, "feedback": "keep going"}"#,
        ));
        let limits = RunLimits {
            debate_round_limit: 2,
            ..Default::default()
        };
        let state = debate_state();

        let update = DebateSubWorkflow::new(&registry, &limits).run(&state).await;
        assert_eq!(update.debate_round, Some(2));
    }

    #[tokio::test]
    async fn test_zero_round_cap_skips_debate_entirely() {
        let registry = registry_with_arbiter(ScriptedWorker::repeating(
            r#"{"should_continue": true}"#,
        ));
        let limits = RunLimits {
            debate_round_limit: 0,
            ..Default::default()
        };
        let state = debate_state();

        let update = DebateSubWorkflow::new(&registry, &limits).run(&state).await;
        assert_eq!(update.debate_round, Some(0));
        assert!(update.messages.is_empty());
        assert!(update.debate_entered);
    }

    #[tokio::test]
    async fn test_unparseable_verdict_defaults_to_stop() {
        let registry = registry_with_arbiter(ScriptedWorker::replies(vec![
            "I find both arguments compelling and cannot decide.".into(),
        ]));
        let limits = RunLimits::default();
        let state = debate_state();

        let update = DebateSubWorkflow::new(&registry, &limits).run(&state).await;
        assert_eq!(update.debate_round, Some(1));
    }

    #[tokio::test]
    async fn test_role_failure_records_and_terminates() {
        let registry = WorkerRegistry::new()
            .with(WorkerRole::AdvocateA, echo(WorkerRole::AdvocateA, "argument"))
            .with(WorkerRole::AdvocateB, failing(WorkerRole::AdvocateB, "model unavailable"))
            .with(
                WorkerRole::Arbiter,
                echo(WorkerRole::Arbiter, r#"{"should_continue": false}"#),
            );
        let limits = RunLimits::default();
        let state = debate_state();

        let update = DebateSubWorkflow::new(&registry, &limits).run(&state).await;
        // The failed round still counts.
        assert_eq!(update.debate_round, Some(1));
        assert!(update
            .messages
            .iter()
            .any(|m| m.role == Role::System && m.content.contains("Debate halted")));
    }

    #[test]
    fn test_parse_verdict_requires_continuation_flag() {
        assert!(parse_verdict(r#"{"reason": "no flag"}"#).is_none());
        let verdict = parse_verdict(r#"{"should_continue": true}"#).unwrap();
        assert!(verdict.should_continue);
        assert!(verdict.feedback.is_none());
    }
}
