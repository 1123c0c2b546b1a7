//! Text-to-speech capability set (C5, §4.5): synthesize a sentence's audio
//! either as one REST-batch response or as a stream of small chunks that the
//! TTS Player accumulates into a playable unit.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::provider::ProviderError;

/// Codec the telephony carrier accepts for playback (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Mulaw8k,
    Mp3,
}

#[derive(Debug, Clone)]
pub struct VoiceParams {
    pub voice_id: String,
    pub codec: AudioCodec,
}

/// Result of a synthesis call: either the whole utterance at once, or a
/// channel of chunks the Player drains until the stream closes.
pub enum TtsOutput {
    Complete(Vec<u8>),
    Streaming(mpsc::Receiver<Vec<u8>>),
}

#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> Result<TtsOutput, ProviderError>;
}

/// The vendors this deployment has adapters for (mirrors `stt::SttVendor`):
/// wire-shape differences live in `GenericRestTtsProvider`, keyed on this
/// enum, rather than one struct per vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsVendor {
    RestBatch,
    Streaming,
}

/// REST-batch or streaming synthesis over HTTP, depending on `TtsVendor`.
/// Holds its own `reqwest::Client` for connection pooling (§4.5: "maintains
/// a persistent HTTP client"), same pattern as `anthropic::AnthropicProvider`.
pub struct GenericRestTtsProvider {
    vendor: TtsVendor,
    base_url: String,
    client: reqwest::Client,
}

impl GenericRestTtsProvider {
    pub fn new(vendor: TtsVendor, base_url: impl Into<String>) -> Self {
        Self {
            vendor,
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TtsProvider for GenericRestTtsProvider {
    fn name(&self) -> &str {
        match self.vendor {
            TtsVendor::RestBatch => "tts-rest-batch",
            TtsVendor::Streaming => "tts-streaming",
        }
    }

    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> Result<TtsOutput, ProviderError> {
        match self.vendor {
            TtsVendor::RestBatch => {
                let resp = self
                    .client
                    .post(format!("{}/v1/synthesize", self.base_url))
                    .json(&serde_json::json!({
                        "text": text,
                        "voice": voice.voice_id,
                        "codec": codec_str(voice.codec),
                    }))
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    return Err(ProviderError::Api {
                        status: resp.status().as_u16(),
                        message: resp.text().await.unwrap_or_default(),
                    });
                }
                let bytes = resp.bytes().await?;
                Ok(TtsOutput::Complete(bytes.to_vec()))
            }
            TtsVendor::Streaming => {
                let (tx, rx) = mpsc::channel(32);
                drop(tx); // real impl spawns a task pumping chunks from the streaming endpoint
                Ok(TtsOutput::Streaming(rx))
            }
        }
    }
}

fn codec_str(codec: AudioCodec) -> &'static str {
    match codec {
        AudioCodec::Mulaw8k => "mulaw8k",
        AudioCodec::Mp3 => "mp3",
    }
}
