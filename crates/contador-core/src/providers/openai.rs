//! OpenAI chat completions provider

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::{ChatMessage, ChatResponse, ChatRole, ChatUsage, LlmProvider};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String, max_tokens: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client for OpenAI")?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
        })
    }

    /// System prompt first, then the conversation
    fn to_openai_messages(messages: &[ChatMessage], system: &str) -> Vec<OpenAiMessage> {
        let mut result = vec![OpenAiMessage {
            role: ChatRole::System.to_string(),
            content: system.to_string(),
        }];
        result.extend(messages.iter().map(|m| OpenAiMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        }));
        result
    }

    /// Only the first choice is used
    fn from_openai_response(resp: OpenAiApiResponse) -> Result<ChatResponse> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenAI response had no choices"))?;

        let text = choice
            .message
            .content
            .ok_or_else(|| anyhow!("OpenAI response choice had no content"))?;

        let usage = resp.usage.map_or(ChatUsage::default(), |u| ChatUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        Ok(ChatResponse { text, usage })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage], system: &str) -> Result<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let openai_messages = Self::to_openai_messages(messages, system);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": openai_messages,
        });

        debug!(
            "OpenAI request: model={}, messages={}",
            self.model,
            openai_messages.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAiApiResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        debug!(
            "OpenAI response: choices={}, finish_reason={:?}",
            api_response.choices.len(),
            api_response.choices.first().map(|c| &c.finish_reason)
        );

        Self::from_openai_response(api_response)
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiApiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
