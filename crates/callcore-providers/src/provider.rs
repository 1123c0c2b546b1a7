use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::prompt::SystemPrompt;
use crate::stream::StreamEvent;

/// Classification of a provider's authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Plain API key (e.g. `sk-...`).
    ApiKey,
    /// OAuth access token with refresh capability.
    OAuth,
    /// No authentication needed (e.g. local Ollama).
    None,
}

/// Snapshot of a provider's current authentication state.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub token_type: TokenType,
    /// Unix timestamp (seconds) when the token expires. `None` if unknown.
    pub expires_at: Option<i64>,
    /// Whether the provider can automatically refresh its credentials.
    pub refreshable: bool,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Request to an LLM provider — used for turn production (§4.3), transition
/// evaluation (§4.4.3), and variable extraction (§4.4.5) alike; callers
/// distinguish by what they do with `ChatResponse.content`.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// Plain text system prompt (used by non-Anthropic providers).
    pub system: String,
    /// Optional 3-tier prompt with cache breakpoints (Anthropic only).
    pub system_prompt: Option<SystemPrompt>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Response from an LLM provider (non-streaming).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

/// Common interface for all LLM providers (Anthropic, OpenAI-compatible, Ollama).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a non-streaming chat request, wait for full response. Used for
    /// transition evaluation and variable extraction, where the caller needs
    /// the whole answer before acting on it.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Stream response events through a channel. Used for turn production
    /// (§4.3), where sentences must be forwarded to TTS as soon as they
    /// complete. Default: falls back to non-streaming send, emits one
    /// TextDelta + Done.
    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let resp = self.send(req).await?;
        let _ = tx.send(StreamEvent::TextDelta { text: resp.content }).await;
        let _ = tx
            .send(StreamEvent::Done {
                model: resp.model,
                tokens_in: resp.tokens_in,
                tokens_out: resp.tokens_out,
                stop_reason: resp.stop_reason,
            })
            .await;
        Ok(())
    }

    /// Return current authentication state. Providers without tokens return `None`.
    fn token_info(&self) -> Option<TokenInfo> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}
