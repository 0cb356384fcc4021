//! Chat completion providers
//!
//! The bot only needs single-turn completions: a fixed persona plus the
//! user's message. Providers implement [`LlmProvider`].

pub mod openai;
pub mod types;

use anyhow::{Context, Result};
use tracing::debug;

pub use openai::OpenAiProvider;
pub use types::{ChatMessage, ChatResponse, ChatRole, LlmProvider};

/// Persona used for conversational replies
pub const ASSISTANT_PERSONA: &str = "Eres un asistente financiero.";

/// Single-turn completion: returns the first choice's text, trimmed
pub async fn ask(provider: &dyn LlmProvider, system: &str, message: &str) -> Result<String> {
    let response = provider
        .chat(&[ChatMessage::user(message)], system)
        .await
        .with_context(|| format!("Completion request to {} failed", provider.provider_name()))?;
    debug!(
        "{} ({}) answered with {} output tokens",
        provider.provider_name(),
        provider.model(),
        response.usage.output_tokens
    );
    Ok(response.text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_ask_trims_and_passes_persona() {
        let provider = ScriptedProvider::replying("  Ahorra el 20% de tu sueldo.\n");
        let answer = ask(&provider, ASSISTANT_PERSONA, "¿Cuánto ahorro?").await.unwrap();
        assert_eq!(answer, "Ahorra el 20% de tu sueldo.");

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, ASSISTANT_PERSONA);
        assert_eq!(calls[0].1, vec![ChatMessage::user("¿Cuánto ahorro?")]);
    }

    #[tokio::test]
    async fn test_ask_propagates_failure() {
        let provider = ScriptedProvider::failing();
        assert!(ask(&provider, ASSISTANT_PERSONA, "hola").await.is_err());
    }
}
