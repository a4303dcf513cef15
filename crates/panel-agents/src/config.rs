//! Panel configuration: one OpenAI-compatible endpoint, per-role model
//! overrides, and run limits. Values layer file < environment < built-in
//! defaults, matching how the rest of the stack is deployed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use orchestration::RunLimits;
use serde::Deserialize;

/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
}

/// Top-level panel configuration.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub endpoint: Endpoint,
    /// Per-role model overrides, keyed by role name.
    pub role_models: BTreeMap<String, String>,
    pub limits: RunLimits,
    /// Directory reports are written into.
    pub output_dir: PathBuf,
}

/// On-disk layout of an optional TOML config file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    endpoint: Option<Endpoint>,
    #[serde(default)]
    role_models: BTreeMap<String, String>,
    output_dir: Option<PathBuf>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint {
                url: std::env::var("PANEL_API_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/v1".into()),
                api_key: std::env::var("PANEL_API_KEY").ok(),
                model: std::env::var("PANEL_MODEL")
                    .unwrap_or_else(|_| "panel-analyst-default".into()),
            },
            role_models: BTreeMap::new(),
            limits: RunLimits::from_env(),
            output_dir: std::env::var("PANEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("reports")),
        }
    }
}

impl PanelConfig {
    /// Defaults overlaid with a TOML file. Environment variables still win
    /// for the endpoint because `Default` reads them first; the file fills
    /// whatever the environment left unset.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let file: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        let mut config = Self::default();
        if std::env::var("PANEL_API_URL").is_err() {
            if let Some(endpoint) = file.endpoint {
                config.endpoint = endpoint;
            }
        }
        config.role_models.extend(file.role_models);
        if let Some(dir) = file.output_dir {
            if std::env::var("PANEL_OUTPUT_DIR").is_err() {
                config.output_dir = dir;
            }
        }
        Ok(config)
    }

    /// The model serving a role: its override, or the endpoint default.
    pub fn model_for(&self, role_name: &str) -> &str {
        self.role_models
            .get(role_name)
            .map(String::as_str)
            .unwrap_or(&self.endpoint.model)
    }
}
