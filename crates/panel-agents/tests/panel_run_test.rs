//! End-to-end panel run over scripted workers: team formation, the full
//! driver loop, and report rendering without any model endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use orchestration::{
    Message, RemediationAction, StaticRemediation, Worker, WorkerError, WorkerOutput,
    WorkerRegistry, WorkerRole, WorkflowBuilder,
};
use panel_agents::{form_team, report};

struct Canned {
    reply: String,
}

#[async_trait]
impl Worker for Canned {
    async fn invoke(&self, _history: &[Message]) -> Result<WorkerOutput, WorkerError> {
        Ok(WorkerOutput::from_messages(vec![Message::ai(
            self.reply.clone(),
        )]))
    }
}

fn canned(reply: &str) -> Arc<dyn Worker> {
    Arc::new(Canned {
        reply: reply.to_string(),
    })
}

#[tokio::test]
async fn panel_team_runs_to_report() {
    let mut registry = WorkerRegistry::new();
    registry.register(WorkerRole::Quant, canned("HHI rises from 1900 to 2700."));
    registry.register(WorkerRole::CaseLaw, canned("Closest precedent holds for the agency."));
    registry.register(WorkerRole::Verifier, canned("Both claims are supported."));
    registry.register(
        WorkerRole::Synthesis,
        canned("Concentration exceeds agency thresholds; scrutiny is likely."),
    );

    let team = form_team(Some("quant,case_law,verifier"), false).unwrap();
    let workflow = WorkflowBuilder::new(registry)
        .build(
            team,
            Arc::new(StaticRemediation::new(RemediationAction::Fallback)),
        )
        .unwrap();

    let outcome = workflow.run("Will the merger draw scrutiny?", false).await;
    assert_eq!(
        outcome.routing_history,
        vec!["quant", "case_law", "verifier", "synthesis"]
    );
    assert!(outcome.final_answer.contains("scrutiny"));

    let rendered = report::render("Will the merger draw scrutiny?", &outcome);
    assert!(rendered.contains("## Answer"));
    assert!(rendered.contains("- verifier"));
}

#[tokio::test]
async fn missing_panel_member_fails_assembly() {
    let mut registry = WorkerRegistry::new();
    registry.register(WorkerRole::Quant, canned("numbers"));

    let team = form_team(Some("quant"), false).unwrap();
    // Synthesis joins the team automatically but is not registered.
    let result = WorkflowBuilder::new(registry).build(
        team,
        Arc::new(StaticRemediation::new(RemediationAction::Fallback)),
    );
    assert!(result.is_err());
}
