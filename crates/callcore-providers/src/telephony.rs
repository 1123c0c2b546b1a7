//! Telephony control-plane client (§6): the narrow surface the TTS Player
//! (C5) and Barge-In Supervisor (C6) need — request playback of synthesized
//! audio, stop it, and track issued playback ids per call. A generic HTTP
//! client covers any carrier whose control plane exposes REST play/stop
//! endpoints; carrier-specific quirks live in the base URL/path shape only.

use async_trait::async_trait;

use crate::provider::ProviderError;
use crate::tts::AudioCodec;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaybackId(pub String);

#[async_trait]
pub trait TelephonyClient: Send + Sync {
    /// Requests playback of `audio` on `call_id`'s media leg. Returns the
    /// carrier's playback id so it can be tracked in the cross-worker
    /// playback set (§4.5) and stopped later.
    async fn play(
        &self,
        call_id: &str,
        audio: &[u8],
        codec: AudioCodec,
    ) -> Result<PlaybackId, ProviderError>;

    /// Stops a specific in-flight playback. The carrier may 404 if playback
    /// already finished naturally — callers treat that as success (§4.6:
    /// "best-effort; the API may 404 if playback already completed").
    async fn stop(&self, call_id: &str, playback_id: &PlaybackId) -> Result<(), ProviderError>;

    /// Stops all playback on `call_id`'s media leg (§6: "stop by id or by
    /// call"). Used by the Barge-In Supervisor, which clears the
    /// cross-worker playback-id set but cannot enumerate its members to
    /// stop them individually (the session store exposes no member-listing
    /// operation — §6's contract is deliberately narrow).
    async fn stop_call(&self, call_id: &str) -> Result<(), ProviderError>;
}

/// Generic REST-backed telephony client. Holds a persistent `reqwest::Client`
/// for connection pooling (§4.5).
pub struct HttpTelephonyClient {
    base_url: String,
    connection_id: String,
    client: reqwest::Client,
}

impl HttpTelephonyClient {
    pub fn new(base_url: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connection_id: connection_id.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TelephonyClient for HttpTelephonyClient {
    async fn play(
        &self,
        call_id: &str,
        audio: &[u8],
        codec: AudioCodec,
    ) -> Result<PlaybackId, ProviderError> {
        let codec_str = match codec {
            AudioCodec::Mulaw8k => "mulaw8k",
            AudioCodec::Mp3 => "mp3",
        };
        let resp = self
            .client
            .post(format!(
                "{}/connections/{}/calls/{}/play",
                self.base_url, self.connection_id, call_id
            ))
            .header("content-type", "application/octet-stream")
            .header("x-audio-codec", codec_str)
            .body(audio.to_vec())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Api {
                status: resp.status().as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        let body: serde_json::Value = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let id = body
            .get("playback_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Parse("missing playback_id".into()))?;
        Ok(PlaybackId(id.to_string()))
    }

    async fn stop(&self, call_id: &str, playback_id: &PlaybackId) -> Result<(), ProviderError> {
        let resp = self
            .client
            .delete(format!(
                "{}/connections/{}/calls/{}/play/{}",
                self.base_url, self.connection_id, call_id, playback_id.0
            ))
            .send()
            .await?;
        if resp.status().as_u16() == 404 || resp.status().is_success() {
            return Ok(());
        }
        Err(ProviderError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        })
    }

    async fn stop_call(&self, call_id: &str) -> Result<(), ProviderError> {
        let resp = self
            .client
            .delete(format!(
                "{}/connections/{}/calls/{}/play",
                self.base_url, self.connection_id, call_id
            ))
            .send()
            .await?;
        if resp.status().as_u16() == 404 || resp.status().is_success() {
            return Ok(());
        }
        Err(ProviderError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        })
    }
}
