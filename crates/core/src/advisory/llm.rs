//! HTTP client for hosted language models.
//!
//! Speaks the Anthropic Messages API and the OpenAI Chat Completions API.
//! Only the first text block of the reply is used.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::LanguageModel;
use crate::config::{AdvisoryConfig, LlmProvider};
use crate::errors::AdvisoryError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Language-model client backed by a provider's HTTP API.
pub struct LlmClient {
    provider: LlmProvider,
    model: String,
    base_url: String,
    api_key: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(
        provider: LlmProvider,
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdvisoryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("depwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let model = model.into();
        info!(%provider, model = %model, "initializing language model client");
        Ok(Self {
            provider,
            model,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
            http,
        })
    }

    /// Build a client from resolved advisory settings.
    pub fn from_config(config: &AdvisoryConfig) -> Result<Self, AdvisoryError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AdvisoryError::MissingApiKey(config.api_key_env_name().to_string()))?;
        Self::new(
            config.provider,
            config.model_name(),
            config.base_url(),
            api_key,
            config.timeout(),
        )
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::Anthropic => format!("{}/v1/messages", self.base_url),
            LlmProvider::OpenAi => format!("{}/v1/chat/completions", self.base_url),
        }
    }

    #[instrument(skip_all, fields(provider = %self.provider, model = %self.model))]
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, AdvisoryError> {
        let url = self.endpoint();
        let body = request_body(&self.model, prompt, max_tokens);
        debug!(url = %url, prompt_len = prompt.len(), "sending completion request");

        let request = match self.provider {
            LlmProvider::Anthropic => self
                .http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            LlmProvider::OpenAi => self.http.post(&url).bearer_auth(&self.api_key),
        };

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, "language model provider returned error");
            return Err(AdvisoryError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                AdvisoryError::Timeout(self.timeout.as_secs())
            } else {
                AdvisoryError::MalformedResponse(e.to_string())
            }
        })?;
        let text = extract_text(self.provider, &json)?;
        debug!(len = text.len(), "completion received");
        Ok(text)
    }

    fn map_transport(&self, e: reqwest::Error) -> AdvisoryError {
        if e.is_timeout() {
            AdvisoryError::Timeout(self.timeout.as_secs())
        } else {
            AdvisoryError::HttpError(e)
        }
    }
}

impl LanguageModel for LlmClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, AdvisoryError> {
        self.complete(prompt, max_tokens).await
    }
}

/// Both APIs accept the same single-user-message shape.
fn request_body(model: &str, prompt: &str, max_tokens: u32) -> Value {
    serde_json::json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [
            { "role": "user", "content": prompt }
        ],
    })
}

/// Pull the reply text out of a provider response body.
fn extract_text(provider: LlmProvider, body: &Value) -> Result<String, AdvisoryError> {
    let text = match provider {
        LlmProvider::Anthropic => body
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            })
            .and_then(|b| b.get("text"))
            .and_then(Value::as_str),
        LlmProvider::OpenAi => body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.pointer("/message/content"))
            .and_then(Value::as_str),
    };

    text.map(str::to_string).ok_or_else(|| {
        AdvisoryError::MalformedResponse(format!("no text content in {} response", provider))
    })
}
