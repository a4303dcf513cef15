use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use orchestration::WorkflowBuilder;
use panel_agents::{
    build_registry, form_team, suggest_team, ChatClient, LlmRemediation, PanelConfig,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "panel-agents", about = "Multi-agent analysis panel over one query")]
struct Cli {
    /// The question the panel answers.
    query: String,

    /// Comma-separated worker roles, scheduled in the given order.
    /// When omitted, the model suggests a team for the query.
    #[arg(long)]
    workers: Option<String>,

    /// Route the run through the adversarial debate.
    #[arg(long)]
    debate: bool,

    /// Optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report directory (overrides config and environment).
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PanelConfig::load(path)?,
        None => PanelConfig::default(),
    };
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    info!(endpoint = %config.endpoint.url, "panel starting");

    let client = ChatClient::new(&config.endpoint);
    let registry = build_registry(&config, &client);
    let team = match cli.workers.as_deref() {
        Some(spec) => form_team(Some(spec), cli.debate)?,
        None => suggest_team(&client, &config.endpoint.model, &cli.query, cli.debate).await,
    };
    let remediation = Arc::new(LlmRemediation::new(
        config.endpoint.model.clone(),
        client.clone(),
    ));

    let workflow = WorkflowBuilder::new(registry)
        .limits(config.limits)
        .build(team, remediation)?;
    let outcome = workflow.run(&cli.query, cli.debate).await;

    let report_path = panel_agents::report::write(&config.output_dir, &cli.query, &outcome)?;
    info!(report = %report_path.display(), "report written");

    println!("{}", outcome.final_answer);
    Ok(())
}
