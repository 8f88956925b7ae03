//! LLM adapter: provider abstraction behind a trait object.
//!
//! The pipeline stages depend on `DynLlmClient` only; the concrete client is
//! constructed once from config and passed in, never a module-global
//! singleton. Any transport, parse, or schema error on the provider side
//! collapses to `None`; stages degrade to deterministic fallbacks and no
//! LLM error ever reaches a caller.

pub mod openai;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::config::LlmConfig;
pub use openai::OpenAiClient;

/// One successful chat completion in JSON-object mode.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCompletion {
    /// Raw message content; callers parse it (and tolerate code fences).
    pub content: String,
    pub latency_ms: u64,
    pub prompt_tokens: u64,
}

/// Capability object used by both pipeline stages.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Ask for a single JSON object. `None` on any failure.
    async fn complete_json(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Option<LlmCompletion>;

    /// Model identifier for report meta and diagnostics.
    fn model_name(&self) -> &str;
}

pub type DynLlmClient = Arc<dyn LlmClient>;

/// Factory: build a client according to config and environment.
///
/// * `LLM_TEST_MODE=mock` returns a deterministic mock regardless of config.
/// * `enabled = false` returns a client that always declines; the pipeline
///   still runs end to end on deterministic values.
/// * `provider = "openai"` builds the real client.
pub fn build_client(config: &LlmConfig) -> DynLlmClient {
    if std::env::var("LLM_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        info!("LLM_TEST_MODE=mock: using scripted mock client");
        return Arc::new(ScriptedClient::fixed("{}"));
    }

    if !config.enabled {
        return Arc::new(DisabledClient);
    }

    match config.provider.as_str() {
        "openai" => Arc::new(OpenAiClient::new(config)),
        other => {
            tracing::warn!(provider = other, "unknown LLM provider, disabling");
            Arc::new(DisabledClient)
        }
    }
}

/// Always returns `None`; used when the LLM is switched off.
pub struct DisabledClient;

#[async_trait]
impl LlmClient for DisabledClient {
    async fn complete_json(&self, _: &str, _: &str, _: f32) -> Option<LlmCompletion> {
        None
    }
    fn model_name(&self) -> &str {
        "disabled"
    }
}

/// Test double: pops scripted responses in order, then falls back to an
/// optional fixed default. `Some(json)` simulates a completion, `None` a
/// failed call.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Option<String>>>,
    default: Option<String>,
}

impl ScriptedClient {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            default: None,
        }
    }

    /// A client that answers every call with the same content.
    pub fn fixed(content: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default: Some(content.to_string()),
        }
    }

    /// Remaining scripted responses (for asserting call counts in tests).
    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("poisoned script queue").len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete_json(&self, _: &str, _: &str, _: f32) -> Option<LlmCompletion> {
        let next = {
            let mut q = self.responses.lock().expect("poisoned script queue");
            q.pop_front()
        };
        let content = match next {
            Some(scripted) => scripted?,
            None => self.default.clone()?,
        };
        Some(LlmCompletion {
            content,
            latency_ms: 1,
            prompt_tokens: 10,
        })
    }
    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_client_pops_in_order_then_defaults_to_none() {
        let c = ScriptedClient::new(vec![Some("{\"a\":1}".to_string()), None]);
        assert_eq!(
            c.complete_json("s", "u", 0.0).await.unwrap().content,
            "{\"a\":1}"
        );
        assert!(c.complete_json("s", "u", 0.0).await.is_none());
        // Queue exhausted, no default configured.
        assert!(c.complete_json("s", "u", 0.0).await.is_none());
    }

    #[tokio::test]
    async fn fixed_client_repeats_forever() {
        let c = ScriptedClient::fixed("{}");
        for _ in 0..3 {
            assert_eq!(c.complete_json("s", "u", 0.0).await.unwrap().content, "{}");
        }
    }

    #[tokio::test]
    async fn disabled_client_declines() {
        assert!(DisabledClient.complete_json("s", "u", 0.2).await.is_none());
        assert_eq!(DisabledClient.model_name(), "disabled");
    }
}
