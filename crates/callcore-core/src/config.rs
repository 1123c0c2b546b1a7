use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8443;
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Webhook handler budget (§4.7): a webhook call that has not returned by
/// this point is treated as timed out and retried once.
pub const WEBHOOK_TIMEOUT_MS: u64 = 15_000;
/// Transition-evaluation budget (§4.4.3): an LLM eval call that exceeds this
/// never silently advances the flow.
pub const TRANSITION_EVAL_TIMEOUT_MS: u64 = 1_500;
/// Variable-extraction budget (§4.4.5): one retry allowed after this.
pub const EXTRACTION_TIMEOUT_MS: u64 = 1_000;
/// Minimum spacing between dead-air check-ins (§4.9).
pub const MIN_CHECKIN_INTERVAL_SECS: u64 = 3;

/// Top-level config (callcore.toml + CALLCORE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallcoreConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub keyvault: KeyVaultConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub deadair: DeadAirConfig,
    #[serde(default)]
    pub telephony: TelephonyConfig,
}

impl Default for CallcoreConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                webhook_signing_secret: None,
            },
            database: DatabaseConfig::default(),
            store: StoreConfig::default(),
            keyvault: KeyVaultConfig::default(),
            providers: ProvidersConfig::default(),
            deadair: DeadAirConfig::default(),
            telephony: TelephonyConfig::default(),
        }
    }
}

/// Telephony control-plane connection (§6), and the backend this gateway
/// reports agent-CRUD-adjacent events to (agent CRUD/CRM/analytics are a
/// separate service, but the base URL is still ambient config every
/// deployment needs to know).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Base URL of the telephony carrier's control-plane REST API.
    pub base_url: String,
    /// This deployment's connection id with the carrier.
    pub connection_id: String,
    /// Base URL of the out-of-scope backend (agent CRUD, CRM, analytics)
    /// this gateway may notify of call lifecycle events.
    pub backend_url: Option<String>,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://telephony.example".to_string(),
            connection_id: "default".to_string(),
            backend_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// HMAC secret for verifying inbound telephony callback signatures.
    pub webhook_signing_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Cross-worker session store connection (C8, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// redis:// URL. When absent, the in-process MemoryStore is used
    /// (single-worker degraded mode, §7 "Cross-worker store down").
    pub redis_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { redis_url: None }
    }
}

/// Key vault (C9) master-key and fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVaultConfig {
    /// Base64-encoded 32-byte AEAD key used to encrypt stored credentials.
    /// Falls back to an insecure dev key with a warning when unset.
    pub master_key_b64: Option<String>,
}

impl Default for KeyVaultConfig {
    fn default() -> Self {
        Self {
            master_key_b64: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Default LLM provider id (resolved via the well-known provider
    /// registry), used when an agent definition doesn't override it.
    pub default_llm_provider: Option<String>,
    pub default_llm_model: Option<String>,
    /// Base URL of the configured TTS vendor's REST endpoint (§4.5, §6).
    pub tts_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadAirConfig {
    #[serde(default = "default_checkin_interval")]
    pub min_checkin_interval_secs: u64,
    #[serde(default = "default_max_checkins")]
    pub max_checkins: u32,
    #[serde(default = "default_max_call_duration_secs")]
    pub max_call_duration_secs: u64,
}

impl Default for DeadAirConfig {
    fn default() -> Self {
        Self {
            min_checkin_interval_secs: default_checkin_interval(),
            max_checkins: default_max_checkins(),
            max_call_duration_secs: default_max_call_duration_secs(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.callcore/callcore.db", home)
}
fn default_checkin_interval() -> u64 {
    MIN_CHECKIN_INTERVAL_SECS
}
fn default_max_checkins() -> u32 {
    3
}
fn default_max_call_duration_secs() -> u64 {
    1500
}

impl CallcoreConfig {
    /// Load config from a TOML file with CALLCORE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.callcore/callcore.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CallcoreConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CALLCORE_").split("_"))
            .extract()
            .map_err(|e| crate::error::CallcoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.callcore/callcore.toml", home)
}
