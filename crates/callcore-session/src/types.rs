use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use callcore_deadair::DeadAirSupervisor;
use callcore_flow::{AgentConfig, ConversationTurn};
use callcore_keyvault::SessionKeyCache;
use callcore_providers::prompt::SystemPrompt;
use callcore_core::types::VariableValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cap on how many of the agent's most recent spoken lines are kept for
/// the cross-worker record's `recent_agent_texts` (§3).
const RECENT_AGENT_TEXTS_CAP: usize = 5;

/// One live call (§3). Lives for as long as the call is connected on this
/// worker; transient fields (HTTP clients, sockets) are not part of this
/// struct and are owned by the orchestrator's per-call task set instead.
pub struct Session {
    pub call_id: String,
    pub agent_id: String,
    pub user_id: String,
    /// Snapshot captured at session start; never refreshed mid-call (§3).
    pub agent_config: AgentConfig,

    pub conversation_history: Mutex<Vec<ConversationTurn>>,
    pub current_node_id: Mutex<Option<String>>,
    pub current_node_label: Mutex<Option<String>>,
    pub session_variables: Mutex<HashMap<String, VariableValue>>,

    pub should_end_call: AtomicBool,
    /// Pauses dead-air tracking while set (§3, §4.9).
    pub executing_webhook: AtomicBool,
    pub is_active: AtomicBool,
    pub call_start_time: Instant,

    pub dead_air: DeadAirSupervisor,
    /// Whether the caller has spoken at all since the call connected;
    /// distinct from the dead-air supervisor's moment-to-moment state.
    pub user_has_spoken: AtomicBool,
    pub silence_greeting_triggered: AtomicBool,
    /// Set when a dead-air check-in line has just been spoken, so the next
    /// final transcript is reported to the supervisor as answering it (§4.9).
    pub awaiting_checkin_response: AtomicBool,

    /// Built once in `create` (prefix-cache friendly); rebuilt by
    /// `refresh_system_prompt` whenever `session_variables` changes in a
    /// way that would otherwise require an inconsistent cached prefix.
    pub cached_system_prompt: Mutex<Option<SystemPrompt>>,

    pub last_transition_time_ms: AtomicU64,
    pub last_kb_time_ms: AtomicU64,

    pub credential_cache: SessionKeyCache,

    // STT/turn-orchestrator transient state carried for cross-worker
    // recovery (§3's cross-worker record fields).
    pub awaiting_speech: AtomicBool,
    pub processing_speech: AtomicBool,
    pub chunk_count: AtomicU64,
    pub last_agent_text: Mutex<String>,
    pub recent_agent_texts: Mutex<VecDeque<String>>,

    /// Observability only (§C "Session stats"): never read by flow logic.
    pub message_count: AtomicU64,
    pub total_tokens: AtomicU64,
}

impl Session {
    pub fn push_agent_text(&self, text: impl Into<String>) {
        let text = text.into();
        *self.last_agent_text.lock().unwrap() = text.clone();
        let mut recent = self.recent_agent_texts.lock().unwrap();
        recent.push_back(text);
        while recent.len() > RECENT_AGENT_TEXTS_CAP {
            recent.pop_front();
        }
    }

    pub fn call_duration_secs(&self) -> u64 {
        self.call_start_time.elapsed().as_secs()
    }

    /// §C "Session stats": recorded after each turn, never consulted by
    /// flow logic.
    pub fn record_turn_stats(&self, tokens: u64) {
        self.message_count.fetch_add(1, Ordering::Relaxed);
        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    /// §3: `customer_name`/`callerName` are kept bidirectionally equal
    /// whenever either is set. Callers that insert one alias directly into
    /// `session_variables` (bypassing extraction's own sync) should follow
    /// up with this.
    pub fn sync_customer_name_alias(&self) {
        const A: &str = "customer_name";
        const B: &str = "callerName";
        let mut vars = self.session_variables.lock().unwrap();
        if let Some(v) = vars.get(A).cloned() {
            vars.entry(B.to_string()).or_insert(v);
        } else if let Some(v) = vars.get(B).cloned() {
            vars.entry(A.to_string()).or_insert(v);
        }
    }

    pub fn to_cross_worker_record(&self) -> CrossWorkerRecord {
        CrossWorkerRecord {
            agent_config: self.agent_config.clone(),
            agent_id: self.agent_id.clone(),
            user_id: self.user_id.clone(),
            custom_variables: self.session_variables.lock().unwrap().clone(),
            conversation_history: self.conversation_history.lock().unwrap().clone(),
            current_node_id: self.current_node_id.lock().unwrap().clone(),
            flow_type: self.agent_config.agent_type,
            awaiting_speech: self.awaiting_speech.load(Ordering::Relaxed),
            last_agent_text: self.last_agent_text.lock().unwrap().clone(),
            recent_agent_texts: self.recent_agent_texts.lock().unwrap().iter().cloned().collect(),
            processing_speech: self.processing_speech.load(Ordering::Relaxed),
            chunk_count: self.chunk_count.load(Ordering::Relaxed),
            user_has_spoken: self.user_has_spoken.load(Ordering::Relaxed),
            silence_greeting_triggered: self.silence_greeting_triggered.load(Ordering::Relaxed),
            message_count: self.message_count.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}

/// Serializable subset of a `Session` with no live connections (§3). Written
/// to the cross-worker store at create, refreshed on key flag changes,
/// deleted on teardown. TTL is `callcore_store::RECORD_TTL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossWorkerRecord {
    pub agent_config: AgentConfig,
    pub agent_id: String,
    pub user_id: String,
    pub custom_variables: HashMap<String, VariableValue>,
    pub conversation_history: Vec<ConversationTurn>,
    pub current_node_id: Option<String>,
    pub flow_type: callcore_flow::AgentType,
    pub awaiting_speech: bool,
    pub last_agent_text: String,
    pub recent_agent_texts: Vec<String>,
    pub processing_speech: bool,
    pub chunk_count: u64,
    pub user_has_spoken: bool,
    pub silence_greeting_triggered: bool,
    pub message_count: u64,
    pub total_tokens: u64,
}
