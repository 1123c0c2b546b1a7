//! Drives `DeadAirSupervisor::tick()` on a periodic timer for the lifetime
//! of a call (§4.9, §5: "dead-air supervisor timer" task).

use std::time::Duration;

use callcore_deadair::DeadAirAction;
use callcore_session::Session;
use tokio::sync::mpsc;
use tracing::{info, instrument};

/// Tick cadence; fine-grained enough that check-in timing (seconds-scale)
/// never drifts more than this.
const TICK_INTERVAL: Duration = Duration::from_millis(500);

pub enum DeadAirSignal {
    CheckIn,
    EndCall(callcore_deadair::EndReason),
}

/// Runs until `session.is_active` goes false or the channel's receiver is
/// dropped. Emits a signal for each non-`None` tick outcome; the caller
/// (the per-call task graph) is responsible for actually speaking the
/// check-in line or tearing down the call.
#[instrument(skip_all, fields(call_id = %session.call_id))]
pub async fn run(session: &Session, tx: mpsc::Sender<DeadAirSignal>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        interval.tick().await;
        if !session.is_active.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }
        match session.dead_air.tick() {
            DeadAirAction::None => {}
            DeadAirAction::CheckIn => {
                info!("dead-air check-in due");
                session
                    .awaiting_checkin_response
                    .store(true, std::sync::atomic::Ordering::Relaxed);
                if tx.send(DeadAirSignal::CheckIn).await.is_err() {
                    break;
                }
            }
            DeadAirAction::EndCall(reason) => {
                info!(?reason, "dead-air ending call");
                let _ = tx.send(DeadAirSignal::EndCall(reason)).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callcore_deadair::DeadAirTimings;
    use callcore_flow::{AgentConfig, AgentSettings, AgentType};
    use callcore_keyvault::{KeyCipher, KeyVault};
    use callcore_store::{MemoryStore, SessionStoreBackend};
    use std::sync::{Arc, Mutex};
    use tokio::time::timeout;

    fn agent_config(timings: DeadAirTimings) -> AgentConfig {
        AgentConfig {
            id: "agent-1".into(),
            agent_type: AgentType::SinglePrompt,
            system_prompt: "Be helpful.".into(),
            settings: AgentSettings {
                stt_provider: None,
                llm_provider: "anthropic".into(),
                tts_provider: None,
                llm_model: "claude".into(),
                temperature: 0.7,
                max_tokens: 512,
                voice_settings: serde_json::json!({}),
                dead_air_settings: Some(timings),
                provider_settings: serde_json::json!({}),
            },
            call_flow: vec![],
            knowledge_base: false,
        }
    }

    async fn manager() -> callcore_session::SessionManager {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        callcore_keyvault::db::init_db(&conn).unwrap();
        let cipher = KeyCipher::new(&[7u8; 32]).unwrap();
        let keyvault = Arc::new(KeyVault::new(Arc::new(Mutex::new(conn)), cipher));
        let store: Arc<dyn SessionStoreBackend> = Arc::new(MemoryStore::new());
        callcore_session::SessionManager::new(store, keyvault)
    }

    #[tokio::test]
    async fn emits_checkin_after_silence_timeout() {
        let timings = DeadAirTimings {
            silence_timeout_normal_secs: 1,
            silence_timeout_hold_on_secs: 1,
            min_checkin_interval_secs: 0,
            max_checkins: 3,
            max_call_duration_secs: 1800,
        };
        let mgr = manager().await;
        let session = mgr
            .create("call-dead-air", agent_config(timings), "agent-1", "user-1")
            .await
            .unwrap();
        session.dead_air.on_agent_speaking_start();
        session.dead_air.on_agent_speaking_stop();

        let (tx, mut rx) = mpsc::channel(4);
        let run_fut = run(&session, tx);
        tokio::pin!(run_fut);

        let signal = timeout(Duration::from_secs(3), async {
            loop {
                tokio::select! {
                    _ = &mut run_fut => return None,
                    Some(signal) = rx.recv() => return Some(signal),
                }
            }
        })
        .await
        .expect("timed out waiting for a dead-air signal");

        assert!(matches!(signal, Some(DeadAirSignal::CheckIn)));
        assert!(session
            .awaiting_checkin_response
            .load(std::sync::atomic::Ordering::Relaxed));
    }
}
