//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use leadmagnet_core::TextGenerator;
use leadmagnet_shared::{LeadMagnetError, LlmConfig, Result, redact_secrets};

use crate::{USER_AGENT, body_excerpt, endpoint};

/// Chat completions client implementing [`TextGenerator`].
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_output_tokens: u32,
    reasoning_budget: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LeadMagnetError::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint(&config.base_url, "chat/completions")
                .map_err(LeadMagnetError::Llm)?,
            api_key: api_key.into(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            reasoning_budget: config.reasoning_budget,
        })
    }

    /// Thinking budget is only understood by Gemini models.
    fn thinking_budget(&self) -> Option<u32> {
        (self.reasoning_budget > 0 && self.model.to_lowercase().contains("gemini"))
            .then_some(self.reasoning_budget)
    }

    #[instrument(skip_all, fields(model = %self.model, temperature = temperature, json_mode = json_mode))]
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        json_mode: bool,
    ) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens: self.max_output_tokens,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
            thinking_budget: self.thinking_budget(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadMagnetError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("HTTP {status}: {}", body_excerpt(&text));
            warn!(error = %redact_secrets(&message), "chat completion rejected");
            return Err(LeadMagnetError::Llm(message));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LeadMagnetError::Llm(format!("failed to read response: {e}")))?;
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            LeadMagnetError::Llm(format!("malformed response ({e}): {}", body_excerpt(&text)))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LeadMagnetError::Llm("response contained no message content".into()))?;

        debug!(chars = content.len(), "chat completion received");
        Ok(content)
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleClient {
    async fn generate_text(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        self.complete(system, user, temperature, false).await
    }

    async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String> {
        self.complete(system, user, temperature, true).await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_budget: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}
