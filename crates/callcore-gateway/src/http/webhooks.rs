//! Telephony control-plane ingress: call accept creates a Session and
//! spawns its per-call task graph; the callback endpoint carries lifecycle
//! events (call ended, call failed) from the carrier. Signature
//! verification uses the same HMAC-SHA256 webhook pattern as other
//! callback endpoints in this workspace.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use callcore_orchestrator::CallDependencies;
use callcore_providers::{AudioEncoding, AudioParams, HttpTelephonyClient, VoiceParams};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};

use crate::app::AppState;
use crate::providers;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
pub struct CallAcceptRequest {
    pub agent_id: String,
    pub user_id: String,
    #[serde(default)]
    pub audio_encoding: Option<String>,
    #[serde(default)]
    pub sample_rate_hz: Option<u32>,
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// POST /telephony/calls/:call_id/accept — the carrier has connected the
/// PSTN leg; build a Session and spin up its task graph (§4.1, §5).
pub async fn call_accept_handler(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    verify_signature(&state, &headers, &body)?;

    let req: CallAcceptRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid call-accept payload");
        (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid JSON body"})))
    })?;

    let agent_config = state.load_agent_config(&req.agent_id).ok_or_else(|| {
        warn!(agent_id = %req.agent_id, "unknown agent");
        (StatusCode::NOT_FOUND, Json(json!({"error": "unknown agent"})))
    })?;

    let session = state
        .sessions
        .create(&call_id, agent_config.clone(), &req.agent_id, &req.user_id)
        .await
        .map_err(|e| {
            warn!(error = %e, "failed to create session");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal error"})))
        })?;

    let llm_key = state
        .keyvault
        .get_key(&req.user_id, &agent_config.settings.llm_provider, &session.credential_cache)
        .ok();
    let llm = providers::build_llm_provider(&agent_config.settings.llm_provider, llm_key.as_ref().map(|k| k.secret.as_str()));
    let stt = providers::build_stt_provider(agent_config.settings.stt_provider.as_deref());
    let tts = providers::build_tts_provider(
        agent_config.settings.tts_provider.as_deref(),
        state.config.providers.tts_base_url.as_deref().unwrap_or("https://tts.example"),
    );
    let stt_credential = state
        .keyvault
        .get_key(&req.user_id, agent_config.settings.stt_provider.as_deref().unwrap_or("stt"), &session.credential_cache)
        .map(|k| k.secret)
        .unwrap_or_default();
    let telephony = Arc::new(HttpTelephonyClient::new(
        state.config.telephony.base_url.clone(),
        state.config.telephony.connection_id.clone(),
    ));

    let audio_params = AudioParams {
        encoding: match req.audio_encoding.as_deref() {
            Some("pcm16") => AudioEncoding::Pcm16,
            _ => AudioEncoding::Mulaw8k,
        },
        sample_rate_hz: req.sample_rate_hz.unwrap_or(8000),
    };
    let voice = VoiceParams {
        voice_id: req.voice_id.unwrap_or_else(|| "default".to_string()),
        codec: callcore_providers::AudioCodec::Mulaw8k,
    };

    let deps = CallDependencies {
        llm,
        stt,
        tts,
        telephony,
        store: state.sessions.store(),
        http: state.http.clone(),
        knowledge: state.knowledge.clone(),
        stt_credentials: stt_credential,
        audio_params,
        voice,
    };

    let handle = callcore_orchestrator::spawn(session, deps);
    state.calls.insert(call_id.clone(), handle);

    info!(call_id = %call_id, "call accepted, task graph spawned");
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct CallCallback {
    pub event: String,
}

/// POST /telephony/calls/:call_id/callback — call lifecycle events from the
/// carrier (hangup, failure). Tears down the task graph and the Session.
pub async fn call_callback_handler(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    verify_signature(&state, &headers, &body)?;

    let callback: CallCallback = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid call-callback payload");
        (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid JSON body"})))
    })?;

    match callback.event.as_str() {
        "call_ended" | "call_failed" => {
            if let Some((_, handle)) = state.calls.remove(&call_id) {
                handle.shutdown().await;
            }
            if let Err(e) = state.sessions.destroy(&call_id).await {
                warn!(error = %e, call_id = %call_id, "failed to destroy session on teardown");
            }
            info!(call_id = %call_id, event = %callback.event, "call torn down");
        }
        other => {
            warn!(event = %other, "unrecognized call callback event, ignoring");
        }
    }

    Ok(Json(json!({"ok": true})))
}

fn verify_signature(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Result<(), (StatusCode, Json<Value>)> {
    let Some(secret) = state.config.gateway.webhook_signing_secret.as_deref() else {
        return Ok(());
    };

    let sig_header = headers
        .get("x-callcore-signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| auth_error("missing X-Callcore-Signature-256 header"))?;

    let sig_hex = sig_header
        .strip_prefix("sha256=")
        .ok_or_else(|| auth_error("malformed X-Callcore-Signature-256 header"))?;

    let expected = hex::decode(sig_hex).map_err(|_| auth_error("signature header is not valid hex"))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| auth_error("invalid HMAC key length"))?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| auth_error("signature mismatch"))
}

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason, "telephony callback authentication failed");
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "authentication failed", "reason": reason})))
}
