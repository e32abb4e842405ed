//! # Wire Seam
//!
//! The narrow boundary between the orchestration shell and the external
//! WhatsApp protocol engine. Everything hard (pairing handshake,
//! encryption, message framing) lives on the far side of this seam.
//!
//! ## Seam Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Wire Seam                                      │
//! │                                                                         │
//! │   SessionManager                         Protocol Engine               │
//! │  ┌──────────────┐   WireConnector       ┌──────────────────────┐       │
//! │  │   connect()  │ ───────────────────►  │  pairing, encryption │       │
//! │  │              │   negotiate + dial    │  framing, retries    │       │
//! │  │              │                       │                      │       │
//! │  │  event loop  │ ◄─── WireEvent ─────  │  lifecycle, creds,   │       │
//! │  │              │      (mpsc stream)    │  inbound messages    │       │
//! │  │              │                       │                      │       │
//! │  │ send_text()  │ ───► WireClient ────► │  outbound delivery   │       │
//! │  └──────────────┘                       └──────────────────────┘       │
//! │                                                                         │
//! │  Implementations: SocketConnector (production, socket.rs)             │
//! │                   MockConnector   (tests, testing.rs)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use zaplink_core::ConnectionStatus;

use crate::creds::SessionState;
use crate::error::BridgeResult;

// =============================================================================
// Disconnect Reason
// =============================================================================

/// Protocol close code for a terminal logout.
pub const LOGGED_OUT_CODE: u16 = 401;

/// Why the protocol session closed.
///
/// Mirrors the close codes the multi-device protocol reports. Only
/// [`DisconnectReason::LoggedOut`] is terminal: the device was unlinked and
/// re-pairing is required, so no reconnect is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Device was unlinked (401). Terminal.
    LoggedOut,

    /// Network-level loss of the connection (408).
    ConnectionLost,

    /// Paired as multi-device from an incompatible client (411).
    MultideviceMismatch,

    /// Server closed the connection (428).
    ConnectionClosed,

    /// Another client took over the session (440).
    ConnectionReplaced,

    /// Session state is corrupt on the server side (500).
    BadSession,

    /// Server asked for a clean restart (515).
    RestartRequired,

    /// Unmapped close code.
    Unknown(u16),
}

impl DisconnectReason {
    /// Maps a protocol close code to a reason.
    pub fn from_code(code: u16) -> Self {
        match code {
            401 => DisconnectReason::LoggedOut,
            408 => DisconnectReason::ConnectionLost,
            411 => DisconnectReason::MultideviceMismatch,
            428 => DisconnectReason::ConnectionClosed,
            440 => DisconnectReason::ConnectionReplaced,
            500 => DisconnectReason::BadSession,
            515 => DisconnectReason::RestartRequired,
            other => DisconnectReason::Unknown(other),
        }
    }

    /// The protocol close code for this reason.
    pub fn code(&self) -> u16 {
        match self {
            DisconnectReason::LoggedOut => 401,
            DisconnectReason::ConnectionLost => 408,
            DisconnectReason::MultideviceMismatch => 411,
            DisconnectReason::ConnectionClosed => 428,
            DisconnectReason::ConnectionReplaced => 440,
            DisconnectReason::BadSession => 500,
            DisconnectReason::RestartRequired => 515,
            DisconnectReason::Unknown(code) => *code,
        }
    }

    /// Returns true if the session must NOT be reconnected: the user
    /// unlinked this device and a new pairing is required.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DisconnectReason::LoggedOut)
    }
}

// =============================================================================
// Wire Version
// =============================================================================

/// Wire version baked in as a fallback when no manifest is reachable.
pub const FALLBACK_WIRE_VERSION: [u32; 3] = [2, 3000, 1015901307];

/// Protocol wire version negotiated before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireVersion {
    /// Three-part version, e.g. `[2, 3000, 1015901307]`.
    pub version: [u32; 3],

    /// Whether the manifest reported this as the latest version.
    #[serde(default)]
    pub is_latest: bool,
}

impl WireVersion {
    /// The baked-in fallback version.
    pub fn fallback() -> Self {
        WireVersion {
            version: FALLBACK_WIRE_VERSION,
            is_latest: false,
        }
    }
}

impl std::fmt::Display for WireVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.version[0], self.version[1], self.version[2])
    }
}

// =============================================================================
// Client Identity
// =============================================================================

/// Identity presented to the network during pairing: the device shows up
/// under this name in the user's linked-devices list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    /// Display name of the linked device.
    pub name: String,

    /// Browser the session imitates.
    pub browser: String,

    /// Reported client version.
    pub version: String,
}

impl ClientIdentity {
    /// Identity with the default browser/version pair.
    pub fn named(name: impl Into<String>) -> Self {
        ClientIdentity {
            name: name.into(),
            browser: "Chrome".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

// =============================================================================
// Wire Events
// =============================================================================

/// Lifecycle update from the protocol engine.
///
/// Every field is optional: an update may carry only a pairing code, only
/// a status change, or both, matching the engine's event shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleUpdate {
    /// New connection status, if it changed.
    pub connection: Option<ConnectionStatus>,

    /// Freshly issued pairing code, if any.
    pub qr: Option<String>,

    /// Close reason; meaningful only when `connection` is `Close`.
    pub disconnect: Option<DisconnectReason>,
}

/// Events emitted by a live protocol client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// Connection lifecycle changed (status, pairing code, disconnect).
    Lifecycle(LifecycleUpdate),

    /// Credential material rotated; must be persisted.
    CredsRotated(SessionState),

    /// A batch of inbound messages arrived. May be empty.
    MessageBatch(Vec<serde_json::Value>),
}

// =============================================================================
// Connect Request
// =============================================================================

/// Everything the connector needs to construct a protocol client.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Credential material (empty for a fresh pairing).
    pub creds: SessionState,

    /// Negotiated wire version.
    pub version: WireVersion,

    /// Pairing identity.
    pub identity: ClientIdentity,
}

// =============================================================================
// Seam Traits
// =============================================================================

/// Outbound surface of a live protocol client.
#[async_trait]
pub trait WireClient: Send + Sync {
    /// Delivers a text message to a JID.
    async fn send_text(&self, jid: &str, text: &str) -> BridgeResult<()>;
}

/// Factory seam for protocol clients.
///
/// `connect` returns once the client object exists; the connection itself
/// completes asynchronously via the returned event stream.
#[async_trait]
pub trait WireConnector: Send + Sync {
    /// Negotiates the latest compatible wire version. Implementations fall
    /// back to [`WireVersion::fallback`] rather than failing the connect.
    async fn negotiate_version(&self) -> BridgeResult<WireVersion>;

    /// Constructs a protocol client and its event stream.
    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> BridgeResult<(Arc<dyn WireClient>, mpsc::Receiver<WireEvent>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_reason_code_round_trip() {
        for code in [401u16, 408, 411, 428, 440, 500, 515, 999] {
            assert_eq!(DisconnectReason::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_only_logout_is_terminal() {
        assert!(DisconnectReason::LoggedOut.is_terminal());
        assert!(!DisconnectReason::ConnectionLost.is_terminal());
        assert!(!DisconnectReason::ConnectionReplaced.is_terminal());
        assert!(!DisconnectReason::RestartRequired.is_terminal());
        assert!(!DisconnectReason::Unknown(418).is_terminal());
    }

    #[test]
    fn test_wire_version_display() {
        let version = WireVersion {
            version: [2, 3000, 42],
            is_latest: true,
        };
        assert_eq!(version.to_string(), "2.3000.42");
    }

    #[test]
    fn test_client_identity_defaults() {
        let identity = ClientIdentity::named("Zaplink");
        assert_eq!(identity.name, "Zaplink");
        assert_eq!(identity.browser, "Chrome");
        assert_eq!(identity.version, "1.0.0");
    }
}
