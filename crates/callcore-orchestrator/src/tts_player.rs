//! TTS Player (C5, §4.5): synthesizes each sentence in arrival order,
//! submits it for telephony playback, and tracks the issued playback id in
//! the cross-worker playback set so the Barge-In Supervisor can clear it.

use std::time::Duration;

use callcore_providers::{PlaybackId, TelephonyClient, TtsOutput, TtsProvider, VoiceParams};
use callcore_store::SessionStoreBackend;
use tokio::sync::mpsc;
use tracing::{instrument, warn};

use crate::error::{OrchestratorError, Result};

const PLAYBACK_SET_TTL: Duration = Duration::from_secs(3600);

fn playback_key(call_id: &str) -> String {
    format!("playbacks:{call_id}")
}

pub struct TtsPlayer<'a> {
    pub tts: &'a dyn TtsProvider,
    pub telephony: &'a dyn TelephonyClient,
    pub store: &'a dyn SessionStoreBackend,
    pub voice: VoiceParams,
}

impl<'a> TtsPlayer<'a> {
    /// Drains `sentence_rx` in order until the channel closes (end of turn
    /// or call). Never drops a sentence, never plays one twice (§4.5).
    #[instrument(skip_all, fields(call_id))]
    pub async fn run(&self, call_id: &str, mut sentence_rx: mpsc::Receiver<String>) -> Result<()> {
        while let Some(sentence) = sentence_rx.recv().await {
            if let Err(err) = self.play_one(call_id, &sentence).await {
                warn!(%err, "tts playback failed for sentence, continuing");
            }
        }
        Ok(())
    }

    async fn play_one(&self, call_id: &str, sentence: &str) -> Result<()> {
        let output = self.tts.synthesize(sentence, &self.voice).await?;
        let audio = match output {
            TtsOutput::Complete(bytes) => bytes,
            TtsOutput::Streaming(mut chunk_rx) => {
                let mut buf = Vec::new();
                while let Some(chunk) = chunk_rx.recv().await {
                    buf.extend(chunk);
                }
                buf
            }
        };

        let playback_id = self.telephony.play(call_id, &audio, self.voice.codec).await?;
        self.track_playback(call_id, &playback_id).await?;
        Ok(())
    }

    async fn track_playback(&self, call_id: &str, playback_id: &PlaybackId) -> Result<()> {
        self.store
            .set_add(&playback_key(call_id), &playback_id.0, PLAYBACK_SET_TTL)
            .await
            .map_err(|e| OrchestratorError::Store(e.to_string()))
    }

    /// §4.6 steps 1-2: best-effort stop of everything currently playing on
    /// this call, then drop the tracked playback-id set.
    pub async fn stop_all(&self, call_id: &str) -> Result<()> {
        if let Err(err) = self.telephony.stop_call(call_id).await {
            warn!(%err, "stop_call failed (may already have finished), continuing");
        }
        self.store
            .set_clear(&playback_key(call_id))
            .await
            .map_err(|e| OrchestratorError::Store(e.to_string()))
    }
}
