//! OpenAI Chat Completions provider (JSON-object response mode).
//! Requires `OPENAI_API_KEY` unless the key is inlined in config.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{LlmClient, LlmCompletion};
use crate::config::LlmConfig;

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("gigfit/0.1")
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: config.resolved_api_key(),
            model: config.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete_json(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Option<LlmCompletion> {
        if self.api_key.is_empty() {
            return None;
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                // Lowercase "json" sentinel: some models reject json_object
                // mode unless the word appears in the messages.
                Msg {
                    role: "system",
                    content: "reply only with a json object.",
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let started = Instant::now();
        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .ok()?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), model = %self.model, "chat completion failed");
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let content = body.choices.first()?.message.content.trim().to_string();
        if content.is_empty() {
            return None;
        }
        Some(LlmCompletion {
            content,
            latency_ms,
            prompt_tokens: body.usage.unwrap_or_default().prompt_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
