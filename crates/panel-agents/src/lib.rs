//! LLM-backed analysis panel over the orchestration core.
//!
//! This crate supplies everything the core treats as opaque: chat-model
//! workers for each panel role, the model-backed remediation policy,
//! configuration, team formation, and report rendering.

pub mod client;
pub mod config;
pub mod panel;
pub mod prompts;
pub mod report;
pub mod team;

pub use client::{ChatClient, ChatMessage, ClientError};
pub use config::{Endpoint, PanelConfig};
pub use panel::{build_registry, LlmRemediation, LlmWorker};
pub use team::{form_team, full_panel, parse_team, suggest_team};
