use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

mod agents;
mod app;
mod http;
mod providers;

#[derive(Parser, Debug)]
#[command(name = "callcore-gateway")]
struct Cli {
    /// Path to callcore.toml. Defaults to the CALLCORE_CONFIG env var, then
    /// ~/.callcore/callcore.toml.
    #[arg(long)]
    config: Option<String>,

    /// Overrides `gateway.port` from the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callcore_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("CALLCORE_CONFIG").ok());
    let mut config = callcore_core::config::CallcoreConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        callcore_core::config::CallcoreConfig::default()
    });
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let store = callcore_store::connect(config.store.redis_url.as_deref()).await;

    let keyvault_conn = rusqlite::Connection::open(&config.database.path)?;
    callcore_keyvault::db::init_db(&keyvault_conn)?;
    let cipher = match config.keyvault.master_key_b64.as_deref() {
        Some(b64) => callcore_keyvault::KeyCipher::from_base64(b64)?,
        None => {
            tracing::warn!("no key-vault master key configured, using an insecure dev key");
            callcore_keyvault::KeyCipher::new(&[0u8; 32])?
        }
    };
    let keyvault = Arc::new(callcore_keyvault::KeyVault::new(
        Arc::new(std::sync::Mutex::new(keyvault_conn)),
        cipher,
    ));

    let agent_conn = rusqlite::Connection::open(&config.database.path)?;
    agents::init_db(&agent_conn)?;

    let knowledge_conn = rusqlite::Connection::open(&config.database.path)?;
    let knowledge = Some(Arc::new(callcore_knowledge::KnowledgeManager::new(knowledge_conn)));

    let sessions = callcore_session::SessionManager::new(store, keyvault.clone());

    let state = Arc::new(app::AppState::new(config, sessions, keyvault, agent_conn, knowledge));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("callcore gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
