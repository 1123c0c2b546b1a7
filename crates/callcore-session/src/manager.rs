use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use callcore_deadair::DeadAirSupervisor;
use callcore_flow::AgentConfig;
use callcore_keyvault::{KeyVault, SessionKeyCache};
use callcore_providers::prompt::PromptBuilder;
use callcore_store::SessionStoreBackend;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::types::{CrossWorkerRecord, Session};

const CROSS_WORKER_KEY_PREFIX: &str = "session";

fn cross_worker_key(call_id: &str) -> String {
    format!("{CROSS_WORKER_KEY_PREFIX}:{call_id}")
}

/// C1: creates, looks up, resumes, and destroys `Session`s; coordinates with
/// the cross-worker store so a call can resume on a different process.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    store: Arc<dyn SessionStoreBackend>,
    keyvault: Arc<KeyVault>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStoreBackend>, keyvault: Arc<KeyVault>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store,
            keyvault,
        }
    }

    /// The cross-worker store backend, for callers (the gateway's per-call
    /// task graph) that need direct access alongside the Session itself.
    pub fn store(&self) -> Arc<dyn SessionStoreBackend> {
        self.store.clone()
    }

    /// §4.1: builds the cached system prompt exactly once, sets the
    /// timezone-aware `now` variable, and pre-warms the primary LLM
    /// credential so the first turn doesn't pay the key-fetch cost.
    #[instrument(skip(self, agent_config), fields(call_id, agent_id, user_id))]
    pub async fn create(
        &self,
        call_id: &str,
        agent_config: AgentConfig,
        agent_id: &str,
        user_id: &str,
    ) -> Result<Arc<Session>> {
        let mut variables = HashMap::new();
        variables.insert(
            "now".to_string(),
            callcore_core::types::VariableValue::String(callcore_core::time::eastern_now_display()),
        );

        let start_node = agent_config
            .call_flow
            .iter()
            .find(|n| matches!(n.data, callcore_flow::NodeData::Conversation(_)));
        let node_script = start_node
            .and_then(|n| match &n.data {
                callcore_flow::NodeData::Conversation(d) => Some(d.content.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let prompt = PromptBuilder::new(agent_config.system_prompt.clone(), node_script)
            .build_prompt(&[], None);

        let timings = agent_config.settings.dead_air_settings.unwrap_or_default();

        let session = Arc::new(Session {
            call_id: call_id.to_string(),
            agent_id: agent_id.to_string(),
            user_id: user_id.to_string(),
            agent_config,
            conversation_history: Mutex::new(Vec::new()),
            current_node_id: Mutex::new(None),
            current_node_label: Mutex::new(None),
            session_variables: Mutex::new(variables),
            should_end_call: AtomicBool::new(false),
            executing_webhook: AtomicBool::new(false),
            is_active: AtomicBool::new(true),
            call_start_time: Instant::now(),
            dead_air: DeadAirSupervisor::new(timings),
            user_has_spoken: AtomicBool::new(false),
            silence_greeting_triggered: AtomicBool::new(false),
            awaiting_checkin_response: AtomicBool::new(false),
            cached_system_prompt: Mutex::new(Some(prompt)),
            last_transition_time_ms: AtomicU64::new(0),
            last_kb_time_ms: AtomicU64::new(0),
            credential_cache: SessionKeyCache::new(),
            awaiting_speech: AtomicBool::new(false),
            processing_speech: AtomicBool::new(false),
            chunk_count: AtomicU64::new(0),
            last_agent_text: Mutex::new(String::new()),
            recent_agent_texts: Mutex::new(VecDeque::new()),
            message_count: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
        });

        // Pre-warm: resolve the primary LLM credential now so the first
        // turn doesn't pay the key-fetch cost. A miss here isn't fatal —
        // the real lookup happens again (and surfaces the error) on the
        // first LLM call.
        if let Err(err) =
            self.keyvault
                .get_key(user_id, &session.agent_config.settings.llm_provider, &session.credential_cache)
        {
            warn!(%err, "credential pre-warm failed, will retry on first turn");
        }

        self.write_cross_worker_record(&session).await?;
        self.sessions
            .lock()
            .unwrap()
            .insert(call_id.to_string(), session.clone());

        Ok(session)
    }

    /// §4.1: first checks the in-process table; if absent, attempts to
    /// reconstruct from the cross-worker record so a different worker can
    /// resume the call.
    #[instrument(skip(self), fields(call_id))]
    pub async fn get(&self, call_id: &str) -> Result<Option<Arc<Session>>> {
        if let Some(session) = self.sessions.lock().unwrap().get(call_id).cloned() {
            return Ok(Some(session));
        }

        let Some(raw) = self
            .store
            .get(&cross_worker_key(call_id))
            .await
            .map_err(|e| crate::error::SessionError::Store(e.to_string()))?
        else {
            return Ok(None);
        };

        let record: CrossWorkerRecord = serde_json::from_str(&raw)?;
        debug!("reconstructing session from cross-worker record");
        let session = Arc::new(self.reconstruct(call_id, record));
        self.sessions
            .lock()
            .unwrap()
            .insert(call_id.to_string(), session.clone());
        Ok(Some(session))
    }

    fn reconstruct(&self, call_id: &str, record: CrossWorkerRecord) -> Session {
        let timings = record.agent_config.settings.dead_air_settings.unwrap_or_default();
        Session {
            call_id: call_id.to_string(),
            agent_id: record.agent_id,
            user_id: record.user_id,
            agent_config: record.agent_config,
            conversation_history: Mutex::new(record.conversation_history),
            current_node_id: Mutex::new(record.current_node_id),
            current_node_label: Mutex::new(None),
            session_variables: Mutex::new(record.custom_variables),
            should_end_call: AtomicBool::new(false),
            executing_webhook: AtomicBool::new(false),
            is_active: AtomicBool::new(true),
            call_start_time: Instant::now(),
            dead_air: DeadAirSupervisor::new(timings),
            user_has_spoken: AtomicBool::new(record.user_has_spoken),
            silence_greeting_triggered: AtomicBool::new(record.silence_greeting_triggered),
            awaiting_checkin_response: AtomicBool::new(false),
            cached_system_prompt: Mutex::new(None),
            last_transition_time_ms: AtomicU64::new(0),
            last_kb_time_ms: AtomicU64::new(0),
            credential_cache: SessionKeyCache::new(),
            awaiting_speech: AtomicBool::new(record.awaiting_speech),
            processing_speech: AtomicBool::new(record.processing_speech),
            chunk_count: AtomicU64::new(record.chunk_count),
            last_agent_text: Mutex::new(record.last_agent_text),
            recent_agent_texts: Mutex::new(record.recent_agent_texts.into_iter().collect()),
            message_count: AtomicU64::new(record.message_count),
            total_tokens: AtomicU64::new(record.total_tokens),
        }
    }

    /// Refreshes the cross-worker record. Callers invoke this after any
    /// change to a key flag (history, variables, node position, flags) —
    /// not on every STT chunk.
    pub async fn write_cross_worker_record(&self, session: &Session) -> Result<()> {
        let record = session.to_cross_worker_record();
        let payload = serde_json::to_string(&record)?;
        self.store
            .set(&cross_worker_key(&session.call_id), &payload, Duration::from_secs(callcore_store::RECORD_TTL.as_secs()))
            .await
            .map_err(|e| crate::error::SessionError::Store(e.to_string()))?;
        Ok(())
    }

    /// §4.1: closes provider connections (by dropping the in-process
    /// handle) and deletes the cross-worker record.
    #[instrument(skip(self), fields(call_id))]
    pub async fn destroy(&self, call_id: &str) -> Result<()> {
        if let Some(session) = self.sessions.lock().unwrap().remove(call_id) {
            session.is_active.store(false, std::sync::atomic::Ordering::Relaxed);
        }
        self.store
            .delete(&cross_worker_key(call_id))
            .await
            .map_err(|e| crate::error::SessionError::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callcore_flow::{AgentConfig, AgentSettings, AgentType};
    use callcore_keyvault::KeyVault;
    use callcore_store::MemoryStore;

    fn agent_config() -> AgentConfig {
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
                dead_air_settings: None,
                provider_settings: serde_json::json!({}),
            },
            call_flow: vec![],
            knowledge_base: false,
        }
    }

    fn manager() -> SessionManager {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        callcore_keyvault::db::init_db(&conn).unwrap();
        let cipher = callcore_keyvault::KeyCipher::new(&[7u8; 32]).unwrap();
        let keyvault = Arc::new(KeyVault::new(Arc::new(Mutex::new(conn)), cipher));
        let store: Arc<dyn SessionStoreBackend> = Arc::new(MemoryStore::new());
        SessionManager::new(store, keyvault)
    }

    #[tokio::test]
    async fn create_then_get_returns_in_process_session() {
        let mgr = manager();
        mgr.create("call-1", agent_config(), "agent-1", "user-1").await.unwrap();
        let session = mgr.get("call-1").await.unwrap().expect("session missing");
        assert_eq!(session.call_id, "call-1");
        assert!(session
            .session_variables
            .lock()
            .unwrap()
            .contains_key("now"));
    }

    #[tokio::test]
    async fn destroy_removes_the_cross_worker_record() {
        let mgr = manager();
        mgr.create("call-2", agent_config(), "agent-1", "user-1").await.unwrap();
        mgr.destroy("call-2").await.unwrap();
        // Dropping the in-process session too means a subsequent get()
        // must fail to reconstruct from the (now-deleted) store record.
        mgr.sessions.lock().unwrap().remove("call-2");
        assert!(mgr.get("call-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reconstruction_restores_history_and_node_position() {
        let mgr = manager();
        let session = mgr.create("call-3", agent_config(), "agent-1", "user-1").await.unwrap();
        session
            .conversation_history
            .lock()
            .unwrap()
            .push(callcore_flow::ConversationTurn::user("hi"));
        *session.current_node_id.lock().unwrap() = Some("node-a".to_string());
        mgr.write_cross_worker_record(&session).await.unwrap();
        mgr.sessions.lock().unwrap().remove("call-3");

        let reconstructed = mgr.get("call-3").await.unwrap().expect("session missing");
        assert_eq!(reconstructed.conversation_history.lock().unwrap().len(), 1);
        assert_eq!(
            reconstructed.current_node_id.lock().unwrap().as_deref(),
            Some("node-a")
        );
    }
}
