//! STT ingest loop (C2, §4.2): drains an open `SttStream`'s events for the
//! lifetime of a call, feeding final transcripts to the Turn Orchestrator
//! and voice-activity signals to the Dead-Air Supervisor and Barge-In
//! Supervisor.

use callcore_providers::SttStream;
use callcore_session::Session;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// A final transcript ready for the Turn Orchestrator.
pub struct FinalUtterance(pub String);

/// Runs until the stream closes (`next_event` returns `None`) or
/// `session.is_active` goes false. `utterance_tx` carries final transcripts
/// onward to the turn loop; `barge_in_tx` is signalled on every
/// user-speaking-start so the barge-in supervisor can react immediately,
/// without waiting for the final transcript to arrive.
#[instrument(skip_all, fields(call_id = %session.call_id))]
pub async fn run(
    session: &Session,
    mut stream: Box<dyn SttStream>,
    utterance_tx: mpsc::Sender<FinalUtterance>,
    barge_in_tx: mpsc::Sender<()>,
) {
    while session.is_active.load(std::sync::atomic::Ordering::Relaxed) {
        let Some(event) = stream.next_event().await else {
            break;
        };
        match event {
            callcore_providers::SttEvent::UserSpeakingStart => {
                session.dead_air.on_user_speaking_start();
                if barge_in_tx.send(()).await.is_err() {
                    break;
                }
            }
            callcore_providers::SttEvent::UserSpeakingEnd => {
                // `was_checkin_response` is decided by the caller reading
                // the paired final transcript, not here; this signal alone
                // carries no text (§4.9 takes `(text, was_checkin_response)`
                // together, so the dead-air call happens in the transcript
                // arm below for `is_final` transcripts).
            }
            callcore_providers::SttEvent::Transcript { text, is_final } => {
                if !is_final {
                    continue;
                }
                if text.trim().is_empty() {
                    continue;
                }
                session.user_has_spoken.store(true, std::sync::atomic::Ordering::Relaxed);
                let was_checkin_response = session
                    .awaiting_checkin_response
                    .swap(false, std::sync::atomic::Ordering::Relaxed);
                session.dead_air.on_user_speaking_end(&text, was_checkin_response);
                info!(%was_checkin_response, "final transcript");
                if utterance_tx.send(FinalUtterance(text)).await.is_err() {
                    break;
                }
            }
        }
    }
    if let Err(err) = stream.close().await {
        warn!(%err, "error closing stt stream");
    }
}
