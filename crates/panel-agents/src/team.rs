//! Team formation: decide which panel roles a run schedules.
//!
//! Two paths: an explicit comma-separated list from the caller (resolved
//! deterministically), or a model-suggested subset for the query with a
//! safe fall-back to the full panel when the suggestion is unusable.
//! Either way synthesis always joins, and a debate run pulls in all three
//! participants.

use anyhow::{bail, Result};
use orchestration::parse::extract_json_object;
use orchestration::{DebateSubWorkflow, WorkerRole};
use tracing::{info, warn};

use crate::client::{ChatClient, ChatMessage};

/// The default panel when nothing narrows the selection.
pub fn full_panel() -> Vec<WorkerRole> {
    vec![
        WorkerRole::Literature,
        WorkerRole::Quant,
        WorkerRole::MarketDef,
        WorkerRole::DocAnalyzer,
        WorkerRole::CaseLaw,
        WorkerRole::Explainer,
        WorkerRole::Verifier,
        WorkerRole::Synthesis,
    ]
}

/// Resolve a comma-separated worker list into an ordered selection.
/// Order is preserved because the supervisor schedules in selection order.
pub fn form_team(spec: Option<&str>, debate: bool) -> Result<Vec<WorkerRole>> {
    let team = match spec.map(str::trim).filter(|s| !s.is_empty()) {
        None => full_panel(),
        Some(spec) => {
            let mut team = Vec::new();
            for name in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match name.parse::<WorkerRole>() {
                    Ok(role) => {
                        if !team.contains(&role) {
                            team.push(role);
                        }
                    }
                    Err(e) => bail!("unusable worker list: {e}"),
                }
            }
            team
        }
    };
    let team = complete_team(team, debate);
    info!(team = ?team, "panel formed");
    Ok(team)
}

/// Ask the model which roles the query needs. Unusable output means the
/// full panel runs; the verifier always joins a suggested team so model
/// output never goes unverified.
pub async fn suggest_team(
    client: &ChatClient,
    model: &str,
    query: &str,
    debate: bool,
) -> Vec<WorkerRole> {
    let raw = client
        .complete(model, &[ChatMessage::user(selection_prompt(query))])
        .await;
    let mut team = match raw {
        Ok(raw) => parse_team(&raw).unwrap_or_else(|| {
            warn!("unusable team suggestion, using the full panel");
            full_panel()
        }),
        Err(e) => {
            warn!(error = %e, "team selection call failed, using the full panel");
            full_panel()
        }
    };
    if !team.contains(&WorkerRole::Verifier) {
        team.push(WorkerRole::Verifier);
    }
    let team = complete_team(team, debate);
    info!(team = ?team, "panel suggested");
    team
}

/// Extract a worker list from model prose. Unknown names are dropped;
/// an empty result is unusable.
pub fn parse_team(raw: &str) -> Option<Vec<WorkerRole>> {
    let value = extract_json_object(raw)?;
    let names = value.get("workers")?.as_array()?;
    let mut team = Vec::new();
    for name in names.iter().filter_map(|v| v.as_str()) {
        if let Ok(role) = name.parse::<WorkerRole>() {
            if !role.is_debate_participant() && !team.contains(&role) {
                team.push(role);
            }
        }
    }
    if team.is_empty() {
        return None;
    }
    Some(team)
}

fn complete_team(mut team: Vec<WorkerRole>, debate: bool) -> Vec<WorkerRole> {
    if debate {
        for role in DebateSubWorkflow::PARTICIPANTS {
            if !team.contains(&role) {
                team.push(role);
            }
        }
    }
    if !team.contains(&WorkerRole::Synthesis) {
        team.push(WorkerRole::Synthesis);
    }
    team
}

fn selection_prompt(query: &str) -> String {
    let names: Vec<&str> = full_panel()
        .iter()
        .map(|r| r.name())
        .filter(|n| *n != "synthesis")
        .collect();
    format!(
        "Pick the analysis workers this question needs, in the order they should run.\n\
         Question: {query}\n\
         Available workers: {}\n\
         Reply with exactly one JSON object: {{\"workers\": [\"...\"]}}",
        names.join(", ")
    )
}
