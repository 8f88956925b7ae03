//! Pipeline configuration: `config/pipeline.toml` plus environment
//! overrides. A missing or unreadable file falls back to safe defaults with
//! the LLM disabled, so the deterministic pipeline keeps working.

use std::path::Path;
use std::{env, fs};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_CONFIG_PATH: &str = "GIGFIT_CONFIG_PATH";
/// Per-run model override, mirroring the stage-level override the
/// orchestrator exposes.
pub const ENV_MODEL_OVERRIDE: &str = "OPENAI_MODEL";

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_connect_timeout() -> u64 {
    4
}
fn default_request_timeout() -> u64 {
    20
}
fn default_top_k() -> usize {
    5
}
fn default_batch_size() -> usize {
    5
}
fn default_tolerance() -> f64 {
    0.01
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Only "openai" is implemented; anything else disables the client.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read OPENAI_API_KEY at client build time.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl LlmConfig {
    /// Resolve the actual API key. An empty result makes the provider
    /// decline every call rather than erroring out.
    pub fn resolved_api_key(&self) -> String {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Candidates forwarded to the LLM stages.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates per enrichment call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Numeric tolerance when validating LLM score echoes. One value for
    /// every field; earlier revisions drifted between 0.05 and 0.01.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            batch_size: default_batch_size(),
            tolerance: default_tolerance(),
        }
    }
}

impl Config {
    /// Load from GIGFIT_CONFIG_PATH (default `config/pipeline.toml`), then
    /// apply env overrides. Read or parse failure logs a warning and falls
    /// back to defaults.
    pub fn load() -> Self {
        let path = env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = match fs::read_to_string(Path::new(&path)) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(%path, error = %e, "bad pipeline config, using defaults");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        };
        cfg.apply_env();
        cfg.sanitize();
        cfg
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: Config = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(model) = env::var(ENV_MODEL_OVERRIDE) {
            if !model.trim().is_empty() {
                self.llm.model = model;
            }
        }
    }

    fn sanitize(&mut self) {
        if self.pipeline.top_k == 0 {
            self.pipeline.top_k = default_top_k();
        }
        if self.pipeline.batch_size == 0 {
            self.pipeline.batch_size = default_batch_size();
        }
        if !(self.pipeline.tolerance.is_finite() && self.pipeline.tolerance > 0.0) {
            self.pipeline.tolerance = default_tolerance();
        }
        self.llm.provider = self.llm.provider.to_lowercase();
    }
}
