//! Model-backed workers over the orchestration core.
//!
//! `LlmWorker` adapts one chat endpoint to the `Worker` trait: render the
//! shared conversation, call the model, split a trailing citation block
//! off the reply. `LlmRemediation` does the same for failure handling.

use async_trait::async_trait;
use orchestration::{
    Message, RemediationContext, RemediationPolicy, Role, SourceCitation, Worker, WorkerError,
    WorkerOutput, WorkerRegistry, WorkerRole,
};
use serde_json::Value;
use tracing::debug;

use crate::client::{ChatClient, ChatMessage};
use crate::config::PanelConfig;
use crate::prompts::{remediation_prompt, system_prompt};

/// One panel member backed by a chat model.
pub struct LlmWorker {
    role: WorkerRole,
    model: String,
    prompt: String,
    client: ChatClient,
}

impl LlmWorker {
    pub fn new(role: WorkerRole, model: impl Into<String>, client: ChatClient) -> Self {
        Self {
            role,
            model: model.into(),
            prompt: system_prompt(role),
            client,
        }
    }
}

#[async_trait]
impl Worker for LlmWorker {
    async fn invoke(&self, history: &[Message]) -> Result<WorkerOutput, WorkerError> {
        let mut chat = vec![ChatMessage::system(self.prompt.clone())];
        chat.extend(history.iter().map(render));

        let raw = self
            .client
            .complete(&self.model, &chat)
            .await
            .map_err(|e| WorkerError::new(self.role, e.to_string()))?;
        if raw.trim().is_empty() {
            return Err(WorkerError::new(self.role, "model returned an empty reply"));
        }

        let (body, sources) = split_sources(&raw);
        debug!(role = %self.role, sources = sources.len(), "worker reply parsed");
        Ok(WorkerOutput {
            messages: vec![Message::ai(body)],
            sources,
        })
    }
}

fn render(message: &Message) -> ChatMessage {
    match message.role {
        Role::Human => ChatMessage::user(message.content.clone()),
        Role::Ai => ChatMessage::assistant(message.content.clone()),
        Role::System => ChatMessage::system(message.content.clone()),
    }
}

/// Split the trailing `{"sources": [...]}` line off a worker reply.
/// Anything malformed is left in the body untouched.
fn split_sources(raw: &str) -> (String, Vec<SourceCitation>) {
    let trimmed = raw.trim_end();
    let (body, last_line) = match trimmed.rfind('\n') {
        Some(idx) => (&trimmed[..idx], trimmed[idx + 1..].trim()),
        None => ("", trimmed),
    };

    let Some(sources) = parse_source_line(last_line) else {
        return (raw.trim().to_string(), Vec::new());
    };
    (body.trim().to_string(), sources)
}

fn parse_source_line(line: &str) -> Option<Vec<SourceCitation>> {
    let value: Value = serde_json::from_str(line).ok()?;
    let entries = value.get("sources")?.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(|e| serde_json::from_value(e.clone()).ok())
            .collect(),
    )
}

/// Remediation decisions from the same endpoint.
pub struct LlmRemediation {
    model: String,
    client: ChatClient,
}

impl LlmRemediation {
    pub fn new(model: impl Into<String>, client: ChatClient) -> Self {
        Self {
            model: model.into(),
            client,
        }
    }
}

#[async_trait]
impl RemediationPolicy for LlmRemediation {
    async fn decide(&self, ctx: &RemediationContext) -> Result<String, WorkerError> {
        let prompt = remediation_prompt(&ctx.failed_worker, &ctx.error_message, &ctx.task);
        let role = ctx
            .failed_worker
            .parse::<WorkerRole>()
            .unwrap_or(WorkerRole::Synthesis);
        self.client
            .complete(&self.model, &[ChatMessage::user(prompt)])
            .await
            .map_err(|e| WorkerError::new(role, format!("remediation call failed: {e}")))
    }
}

/// Register a model-backed worker for every role the panel knows.
pub fn build_registry(config: &PanelConfig, client: &ChatClient) -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    for &role in WorkerRole::all() {
        registry.register(
            role,
            std::sync::Arc::new(LlmWorker::new(
                role,
                config.model_for(role.name()),
                client.clone(),
            )),
        );
    }
    registry
}
