//! # Zaplink Gateway
//!
//! Deployable process bridging one WhatsApp session to HTTP/WebSocket
//! consumers.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gateway Startup                                  │
//! │                                                                         │
//! │  tracing ──► config ──► credential store ──► session.start()           │
//! │                              │                     │                    │
//! │                  local dir or cloud mirror    connect in background    │
//! │                              │                     │                    │
//! │                              └──────────┬──────────┘                    │
//! │                                         ▼                               │
//! │                              serve HTTP + WS until SIGINT/SIGTERM      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use zaplink_bridge::config::BridgeConfig;
use zaplink_bridge::creds::{CredentialStore, FileStore};
use zaplink_bridge::gateway::{self, GatewayState};
use zaplink_bridge::relay::EventRelay;
use zaplink_bridge::remote::{CloudStore, RemoteStore};
use zaplink_bridge::session::SessionManager;
use zaplink_bridge::socket::SocketConnector;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting Zaplink gateway...");

    // Load configuration
    let config = BridgeConfig::load_or_default(None);
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }
    info!(
        port = config.port(),
        engine_url = %config.wire.engine_url,
        remote = config.is_remote_enabled(),
        auth_dir = %config.auth.dir.display(),
        "Configuration loaded"
    );

    // Pick the credential store variant
    let store: Arc<dyn CredentialStore> = if config.is_remote_enabled() {
        let remote = RemoteStore::new(&config.remote)?;
        info!(bucket = %config.remote.bucket, "Cloud credential store enabled");
        Arc::new(CloudStore::new(FileStore::new(&config.auth.dir), remote))
    } else {
        Arc::new(FileStore::new(&config.auth.dir))
    };

    // Compose the session
    let relay = EventRelay::new();
    let connector = Arc::new(SocketConnector::new(config.wire.clone()));
    let session = SessionManager::new((&config.wire).into(), store, connector, relay.clone());

    // Connect in the background; the HTTP surface comes up regardless so
    // /status can report the session's progress
    session.start().await;

    // Serve until shutdown
    let state = GatewayState {
        session,
        relay,
    };
    gateway::serve(&config.bind_address(), state, shutdown_signal()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
