//! Scripted stand-ins for the completion service
//!
//! Used by the gateway and CLI test suites, which cannot reach the real
//! provider.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::providers::types::{ChatMessage, ChatResponse, ChatUsage, LlmProvider};

/// Provider that answers every request with the same text and records calls
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    reply: Option<String>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedProvider {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Default::default()
        }
    }

    /// Provider whose every call fails
    pub fn failing() -> Self {
        Self::default()
    }

    /// `(system, messages)` of each call so far
    pub fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: &[ChatMessage], system: &str) -> Result<ChatResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((system.to_string(), messages.to_vec()));
        }
        let text = self
            .reply
            .clone()
            .ok_or_else(|| anyhow!("completion service unavailable"))?;
        Ok(ChatResponse {
            text,
            usage: ChatUsage::default(),
        })
    }
}
