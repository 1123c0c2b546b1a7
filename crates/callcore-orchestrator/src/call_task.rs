//! Per-call task graph (§5): wires STT ingest (C2), the Turn Orchestrator
//! (C3), the TTS Player (C5), the Dead-Air Supervisor timer (C7), and the
//! Barge-In Supervisor (C6) together over bounded channels for the
//! lifetime of one call. Teardown uses one `CancellationToken` per call.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use callcore_knowledge::KnowledgeManager;
use callcore_providers::{AudioParams, LlmProvider, SttProvider, TelephonyClient, TtsProvider, VoiceParams};
use callcore_session::Session;
use callcore_store::SessionStoreBackend;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::barge_in;
use crate::dead_air_task::{self, DeadAirSignal};
use crate::error::Result;
use crate::stt_ingest::{self, FinalUtterance};
use crate::turn::TurnOrchestrator;
use crate::tts_player::TtsPlayer;

const CHANNEL_CAPACITY: usize = 16;

/// A short, fixed check-in line (§4.9's example phrasing). Not
/// configurable per agent; the supervisor's timing is what varies.
const CHECKIN_LINE: &str = "Are you still there?";

pub struct CallDependencies {
    pub llm: Arc<dyn LlmProvider>,
    pub stt: Arc<dyn SttProvider>,
    pub tts: Arc<dyn TtsProvider>,
    pub telephony: Arc<dyn TelephonyClient>,
    pub store: Arc<dyn SessionStoreBackend>,
    pub http: Arc<reqwest::Client>,
    pub knowledge: Option<Arc<KnowledgeManager>>,
    pub stt_credentials: String,
    pub audio_params: AudioParams,
    pub voice: VoiceParams,
}

pub struct CallTaskHandle {
    pub cancellation: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl CallTaskHandle {
    pub async fn shutdown(self) {
        self.cancellation.cancel();
        let _ = self.join.await;
    }
}

/// Spawns the full task graph for one call onto the runtime and returns a
/// handle that tears it down on `shutdown`.
pub fn spawn(session: Arc<Session>, deps: CallDependencies) -> CallTaskHandle {
    let cancellation = CancellationToken::new();
    let token = cancellation.clone();
    let join = tokio::spawn(async move {
        if let Err(err) = run(session, deps, token).await {
            warn!(%err, "call task ended with error");
        }
    });
    CallTaskHandle { cancellation, join }
}

#[instrument(skip_all, fields(call_id = %session.call_id))]
async fn run(session: Arc<Session>, deps: CallDependencies, cancellation: CancellationToken) -> Result<()> {
    let stt_stream = deps.stt.open(deps.audio_params, &deps.stt_credentials).await?;

    let (utterance_tx, mut utterance_rx) = mpsc::channel::<FinalUtterance>(CHANNEL_CAPACITY);
    let (barge_in_tx, mut barge_in_rx) = mpsc::channel::<()>(CHANNEL_CAPACITY);
    let (dead_air_tx, mut dead_air_rx) = mpsc::channel::<DeadAirSignal>(CHANNEL_CAPACITY);
    let (sentence_tx, sentence_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let turn_orchestrator = TurnOrchestrator {
        llm: &*deps.llm,
        http: &deps.http,
        knowledge: deps.knowledge.as_deref(),
    };
    let tts_player = TtsPlayer {
        tts: &*deps.tts,
        telephony: &*deps.telephony,
        store: &*deps.store,
        voice: deps.voice.clone(),
    };

    let stt_fut = stt_ingest::run(&session, stt_stream, utterance_tx, barge_in_tx);
    let dead_air_fut = dead_air_task::run(&session, dead_air_tx);
    let player_fut = tts_player.run(&session.call_id, sentence_rx);

    let turn_loop_fut = async {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                Some(()) = barge_in_rx.recv() => {
                    if let Err(err) = barge_in::handle_barge_in(&session, &tts_player).await {
                        warn!(%err, "barge-in handling failed");
                    }
                }
                Some(signal) = dead_air_rx.recv() => {
                    match signal {
                        DeadAirSignal::CheckIn => {
                            let _ = sentence_tx.send(CHECKIN_LINE.to_string()).await;
                            session.conversation_history.lock().unwrap().push(
                                callcore_flow::ConversationTurn::assistant(CHECKIN_LINE.to_string(), None),
                            );
                        }
                        DeadAirSignal::EndCall(reason) => {
                            info!(?reason, "ending call from dead-air supervisor");
                            session.should_end_call.store(true, Ordering::Relaxed);
                            session.is_active.store(false, Ordering::Relaxed);
                            break;
                        }
                    }
                }
                Some(FinalUtterance(text)) = utterance_rx.recv() => {
                    match turn_orchestrator.handle_utterance(&session, &text, &sentence_tx).await {
                        Ok(outcome) => {
                            if outcome.should_end_call || outcome.transfer_requested.is_some() {
                                session.is_active.store(false, Ordering::Relaxed);
                                break;
                            }
                        }
                        Err(err) => warn!(%err, "turn handling failed"),
                    }
                }
                else => break,
            }
        }
    };

    tokio::join!(stt_fut, dead_air_fut, player_fut, turn_loop_fut);
    Ok(())
}
