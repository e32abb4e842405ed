//! # Bridge Error Types
//!
//! Error types for the orchestration shell.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Bridge Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  InvalidFrame           │ │
//! │  │  InvalidUrl     │  │  Disconnected   │  │  SerializationFailed    │ │
//! │  │  Load/Save      │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Credentials   │  │      Send       │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  CredsLoad      │  │  NotConnected   │  │  ChannelClosed          │ │
//! │  │  CredsSave      │  │  SendFailed     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error type covering all orchestration failures.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum BridgeError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid gateway configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid engine or remote-store URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Credential Store Errors
    // =========================================================================
    /// Failed to load session credentials.
    #[error("Failed to load credentials: {0}")]
    CredsLoadFailed(String),

    /// Failed to persist session credentials.
    #[error("Failed to save credentials: {0}")]
    CredsSaveFailed(String),

    // =========================================================================
    // Transport Errors (engine link)
    // =========================================================================
    /// Failed to establish the engine connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Engine link dropped unexpectedly.
    #[error("Disconnected from protocol engine")]
    Disconnected,

    /// Connection timeout.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// WebSocket protocol error on the engine link.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    // =========================================================================
    // Protocol Errors (engine frames)
    // =========================================================================
    /// Received a frame that could not be interpreted.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Failed to serialize or deserialize a frame.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Send Errors
    // =========================================================================
    /// The session is not open (or no client exists), so sends are refused.
    #[error("Session is not connected")]
    NotConnected,

    /// The protocol client reported a delivery failure.
    #[error("Send failed: {0}")]
    SendFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed (component shut down).
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for BridgeError {
    fn from(err: url::ParseError) -> Self {
        BridgeError::InvalidUrl(err.to_string())
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for BridgeError {
    fn from(err: toml::ser::Error) -> Self {
        BridgeError::ConfigSaveFailed(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BridgeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed => BridgeError::Disconnected,
            WsError::AlreadyClosed => BridgeError::Disconnected,
            WsError::Protocol(p) => BridgeError::WebSocketError(p.to_string()),
            WsError::Io(io) => BridgeError::ConnectionFailed(io.to_string()),
            other => BridgeError::WebSocketError(other.to_string()),
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl BridgeError {
    /// Returns true if this error means the session is merely unavailable
    /// (reported to API callers as 503, never as an internal failure).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BridgeError::NotConnected)
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidConfig(_)
                | BridgeError::InvalidUrl(_)
                | BridgeError::ConfigLoadFailed(_)
                | BridgeError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if this error is a transport fault on the engine link
    /// that the reconnect policy is expected to recover from.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            BridgeError::ConnectionFailed(_)
                | BridgeError::Disconnected
                | BridgeError::Timeout(_)
                | BridgeError::WebSocketError(_)
        )
    }
}
