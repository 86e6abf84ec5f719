//! Minimal client for OpenAI-compatible `/chat/completions` endpoints.

use nexcall_types::Turn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::AgentError;

/// Longest upstream error body kept in [`AgentError::Upstream`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Sampling parameters for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f32,
    max_tokens: u32,
    n: u8,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ChatClient {
    /// Builds a client whose every request is bounded by `config.timeout_ms`.
    pub fn new(config: &LlmConfig) -> Result<Self, AgentError> {
        if config.base_url.trim().is_empty() {
            return Err(AgentError::Config("llm base_url is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("nexcall/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base = config.base_url.trim_end_matches('/');
        let endpoint = if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        };

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Requests exactly one completion for `messages`.
    ///
    /// Returns `Ok(None)` when the backend answered without any content.
    pub async fn complete(
        &self,
        params: &CompletionParams,
        messages: &[Turn],
    ) -> Result<Option<String>, AgentError> {
        let body = ChatRequest {
            model: &params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            n: 1,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_completions_path_once() {
        let mut config = LlmConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = ChatClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");

        config.base_url = "http://localhost:8080/v1/chat/completions".to_string();
        let client = ChatClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let config = LlmConfig {
            base_url: "  ".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            ChatClient::new(&config),
            Err(AgentError::Config(_))
        ));
    }
}
