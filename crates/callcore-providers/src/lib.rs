//! LLM provider abstraction (§4.2 capability set, §6): a common
//! `LlmProvider` trait, concrete Anthropic/OpenAI-compatible/Ollama
//! adapters, a failover `ProviderRouter`, the well-known-provider
//! registry, and the 3-tier system-prompt builder used by the flow
//! interpreter and session manager.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod router;
pub mod stream;
pub mod stt;
pub mod telephony;
pub mod tts;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use prompt::{PromptBuilder, SessionInfo, SystemPrompt};
pub use provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role, TokenInfo, TokenType};
pub use registry::KnownProvider;
pub use router::{ProviderRouter, ProviderSlot};
pub use stream::StreamEvent;
pub use stt::{AudioEncoding, AudioParams, GenericWsSttProvider, SttEvent, SttProvider, SttStream, SttVendor};
pub use telephony::{HttpTelephonyClient, PlaybackId, TelephonyClient};
pub use tts::{AudioCodec, GenericRestTtsProvider, TtsOutput, TtsProvider, TtsVendor, VoiceParams};
