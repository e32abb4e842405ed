//! # Gateway Configuration
//!
//! Configuration management for the bridge.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ZAPLINK_PORT=8080 (PORT also honored)                              │
//! │     ZAPLINK_ENGINE_URL=ws://127.0.0.1:3100/wire                        │
//! │     ZAPLINK_REMOTE_BUCKET=zaplink-sessions                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/zaplink/zaplink.toml (Linux)                             │
//! │     ~/Library/Application Support/com.zaplink.gateway (macOS)          │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     port 3000 (8080 once the remote store is enabled), local auth dir  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # zaplink.toml
//! [server]
//! port = 3000
//! bind_addr = "0.0.0.0"
//!
//! [wire]
//! engine_url = "ws://127.0.0.1:3100/wire"
//! client_name = "Zaplink"
//! reconnect_delay_secs = 5
//!
//! [auth]
//! dir = "auth_state"
//!
//! [remote]
//! enabled = false
//! endpoint = "https://storage.example.com"
//! bucket = "zaplink-sessions"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{BridgeError, BridgeResult};

// =============================================================================
// Defaults
// =============================================================================

/// Default HTTP/WebSocket port for local deployments.
pub const DEFAULT_LOCAL_PORT: u16 = 3000;

/// Default HTTP/WebSocket port for cloud deployments (remote store enabled).
pub const DEFAULT_CLOUD_PORT: u16 = 8080;

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_engine_url() -> String {
    "ws://127.0.0.1:3100/wire".to_string()
}

fn default_client_name() -> String {
    "Zaplink".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_auth_dir() -> PathBuf {
    PathBuf::from("auth_state")
}

// =============================================================================
// Server Settings
// =============================================================================

/// HTTP/WebSocket server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Port to listen on. When unset, defaults to 3000 locally and 8080
    /// once the remote credential store is enabled.
    #[serde(default)]
    pub port: Option<u16>,

    /// Bind address (default: 0.0.0.0).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            port: None,
            bind_addr: default_bind_addr(),
        }
    }
}

// =============================================================================
// Wire Settings (engine link)
// =============================================================================

/// Settings for the link to the protocol engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSettings {
    /// WebSocket URL of the protocol engine.
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// Optional HTTP manifest announcing the latest compatible wire
    /// version. When unset (or unreachable) a baked-in version is used.
    #[serde(default)]
    pub version_url: Option<String>,

    /// Client name presented to the network during pairing.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Engine connection timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Fixed delay before the single reconnect attempt after a
    /// non-terminal disconnect (seconds).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl Default for WireSettings {
    fn default() -> Self {
        WireSettings {
            engine_url: default_engine_url(),
            version_url: None,
            client_name: default_client_name(),
            connect_timeout_secs: default_connect_timeout(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

impl WireSettings {
    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

// =============================================================================
// Auth Settings (credential directory)
// =============================================================================

/// Settings for the local credential directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Directory holding the session-credential files.
    #[serde(default = "default_auth_dir")]
    pub dir: PathBuf,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            dir: default_auth_dir(),
        }
    }
}

// =============================================================================
// Remote Store Settings (cloud variant)
// =============================================================================

/// Settings for the remote object store that mirrors the credential
/// directory in cloud deployments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Enables the cloud credential store.
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the object store HTTP API.
    #[serde(default)]
    pub endpoint: String,

    /// Bucket holding the session objects.
    #[serde(default)]
    pub bucket: String,

    /// Bearer token for the store. Not read from the config file: populated
    /// from `ZAPLINK_REMOTE_TOKEN` so credentials stay out of the TOML.
    #[serde(skip)]
    pub token: Option<String>,
}

// =============================================================================
// Main Bridge Configuration
// =============================================================================

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Engine link settings.
    #[serde(default)]
    pub wire: WireSettings,

    /// Credential directory settings.
    #[serde(default)]
    pub auth: AuthSettings,

    /// Remote store settings (cloud variant).
    #[serde(default)]
    pub remote: RemoteSettings,
}

impl BridgeConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (zaplink.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> BridgeResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| BridgeError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults (plus env overrides) if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> BridgeResult<()> {
        let engine = Url::parse(&self.wire.engine_url)?;
        if engine.scheme() != "ws" && engine.scheme() != "wss" {
            return Err(BridgeError::InvalidUrl(format!(
                "Engine URL must start with ws:// or wss://, got: {}",
                self.wire.engine_url
            )));
        }

        if let Some(ref version_url) = self.wire.version_url {
            let parsed = Url::parse(version_url)?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(BridgeError::InvalidUrl(format!(
                    "Version URL must start with http:// or https://, got: {}",
                    version_url
                )));
            }
        }

        if self.wire.reconnect_delay_secs == 0 {
            return Err(BridgeError::InvalidConfig(
                "reconnect_delay_secs must be greater than 0".into(),
            ));
        }

        if self.remote.enabled {
            if self.remote.bucket.trim().is_empty() {
                return Err(BridgeError::InvalidConfig(
                    "remote store enabled but no bucket configured".into(),
                ));
            }
            let endpoint = Url::parse(&self.remote.endpoint)?;
            if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
                return Err(BridgeError::InvalidUrl(format!(
                    "Remote endpoint must start with http:// or https://, got: {}",
                    self.remote.endpoint
                )));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // Port: ZAPLINK_PORT wins, plain PORT honored for parity with
        // container platforms.
        for var in ["ZAPLINK_PORT", "PORT"] {
            if let Ok(port) = std::env::var(var) {
                if let Ok(p) = port.parse::<u16>() {
                    debug!(port = p, var, "Overriding port from environment");
                    self.server.port = Some(p);
                    break;
                }
            }
        }

        if let Ok(addr) = std::env::var("ZAPLINK_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Ok(url) = std::env::var("ZAPLINK_ENGINE_URL") {
            debug!(url = %url, "Overriding engine URL from environment");
            self.wire.engine_url = url;
        }

        if let Ok(url) = std::env::var("ZAPLINK_VERSION_URL") {
            self.wire.version_url = Some(url);
        }

        if let Ok(name) = std::env::var("ZAPLINK_CLIENT_NAME") {
            self.wire.client_name = name;
        }

        if let Ok(dir) = std::env::var("ZAPLINK_AUTH_DIR") {
            debug!(dir = %dir, "Overriding auth dir from environment");
            self.auth.dir = PathBuf::from(dir);
        }

        if let Ok(endpoint) = std::env::var("ZAPLINK_REMOTE_ENDPOINT") {
            self.remote.enabled = true;
            self.remote.endpoint = endpoint;
        }

        if let Ok(bucket) = std::env::var("ZAPLINK_REMOTE_BUCKET") {
            self.remote.enabled = true;
            self.remote.bucket = bucket;
        }

        if let Ok(token) = std::env::var("ZAPLINK_REMOTE_TOKEN") {
            self.remote.token = Some(token);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "zaplink", "gateway")
            .map(|dirs| dirs.config_dir().join("zaplink.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Effective listen port: explicit value, else 3000 locally and 8080
    /// when the remote store is enabled.
    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(if self.remote.enabled {
            DEFAULT_CLOUD_PORT
        } else {
            DEFAULT_LOCAL_PORT
        })
    }

    /// Full bind address for the gateway listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.port())
    }

    /// Returns true if the cloud credential store is enabled.
    pub fn is_remote_enabled(&self) -> bool {
        self.remote.enabled
    }
}
