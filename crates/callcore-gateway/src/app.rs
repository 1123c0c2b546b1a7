use std::sync::{Arc, Mutex};

use axum::{
    routing::{get, post},
    Router,
};
use callcore_core::config::CallcoreConfig;
use callcore_keyvault::KeyVault;
use callcore_knowledge::KnowledgeManager;
use callcore_orchestrator::CallTaskHandle;
use callcore_session::SessionManager;
use dashmap::DashMap;

/// Central shared state — passed as `Arc<AppState>` to every Axum handler.
/// One struct owning every subsystem; `DashMap` for the table that needs
/// concurrent access from request handlers without a global lock.
pub struct AppState {
    pub config: CallcoreConfig,
    pub sessions: SessionManager,
    pub keyvault: Arc<KeyVault>,
    pub agent_db: Mutex<rusqlite::Connection>,
    pub knowledge: Option<Arc<KnowledgeManager>>,
    pub http: Arc<reqwest::Client>,
    /// Process-wide table of live call tasks: `call_id` -> handle, one
    /// entry per in-flight call, removed on teardown.
    pub calls: DashMap<String, CallTaskHandle>,
}

impl AppState {
    pub fn new(
        config: CallcoreConfig,
        sessions: SessionManager,
        keyvault: Arc<KeyVault>,
        agent_db: rusqlite::Connection,
        knowledge: Option<Arc<KnowledgeManager>>,
    ) -> Self {
        Self {
            config,
            sessions,
            keyvault,
            agent_db: Mutex::new(agent_db),
            knowledge,
            http: Arc::new(reqwest::Client::new()),
            calls: DashMap::new(),
        }
    }

    pub fn load_agent_config(&self, agent_id: &str) -> Option<callcore_flow::AgentConfig> {
        let conn = self.agent_db.lock().unwrap();
        crate::agents::load(&conn, agent_id).ok().flatten()
    }
}

/// Assemble the full Axum router: telephony call-accept and callback
/// webhooks, plus health. Agent CRUD, CRM, and analytics endpoints live
/// on a separate backend and are not this crate's concern.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/telephony/calls/{call_id}/accept",
            post(crate::http::webhooks::call_accept_handler),
        )
        .route(
            "/telephony/calls/{call_id}/callback",
            post(crate::http::webhooks::call_callback_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
