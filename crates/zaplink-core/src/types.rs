//! # Domain Types
//!
//! Connection status, realtime event payloads, and HTTP API payloads.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Zaplink Domain Types                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │ ConnectionStatus│  │   RelayEvent    │  │     HTTP Payloads       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  connecting     │  │  qr             │  │  StatusResponse         │ │
//! │  │  open           │  │  connectionUpd. │  │  SendRequest            │ │
//! │  │  close          │  │  newMessage     │  │  SendResponse           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  All types are plain data: serde in, serde out, no behavior beyond     │
//! │  constructors and predicates.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Connection Status
// =============================================================================

/// Connection status of the single protocol session.
///
/// This is the process-wide truth about the WhatsApp link. It is mutated
/// only by the session manager on protocol lifecycle events and read by
/// everything else.
///
/// ## State Machine
/// ```text
/// ┌────────────┐  socket open   ┌────────┐
/// │ Connecting │ ─────────────► │  Open  │
/// └─────┬──────┘                └───┬────┘
///       │ handshake failed          │ disconnect
///       ▼                           ▼
/// ┌────────────┐  reconnect     ┌────────┐
/// │ Connecting │ ◄───────────── │ Close  │
/// └────────────┘  (non-logout)  └────────┘
/// ```
///
/// Invariant: outbound sends are permitted only while `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Session is being established (initial state).
    #[default]
    Connecting,

    /// Session is authenticated and ready for traffic.
    Open,

    /// Session is down. Terminal only after a logout.
    Close,
}

impl ConnectionStatus {
    /// Returns true if outbound sends are permitted.
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionStatus::Open)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Open => write!(f, "open"),
            ConnectionStatus::Close => write!(f, "close"),
        }
    }
}

// =============================================================================
// Realtime Events
// =============================================================================

/// Payload of a `connectionUpdate` realtime event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    /// Current connection status.
    pub status: ConnectionStatus,
}

/// Events pushed to realtime subscribers.
///
/// Serialized on the wire as `{"event": "<name>", "data": <payload>}` so a
/// browser client can dispatch on the `event` field:
///
/// ```json
/// {"event": "qr", "data": "2@AbC..."}
/// {"event": "connectionUpdate", "data": {"status": "open"}}
/// {"event": "newMessage", "data": {"key": {...}, "message": {...}}}
/// ```
///
/// Delivery is best-effort: subscribers that lag or disconnect simply miss
/// events. This is a live-status mirror, not a durable message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RelayEvent {
    /// A new pairing code was issued and must be scanned.
    Qr(String),

    /// The connection status changed (or was re-announced).
    ConnectionUpdate(ConnectionUpdate),

    /// An inbound message arrived. Payload is forwarded verbatim from the
    /// protocol engine and is opaque to the gateway.
    NewMessage(serde_json::Value),
}

impl RelayEvent {
    /// Event name as seen by subscribers.
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::Qr(_) => "qr",
            RelayEvent::ConnectionUpdate(_) => "connectionUpdate",
            RelayEvent::NewMessage(_) => "newMessage",
        }
    }
}

// =============================================================================
// Session Snapshot
// =============================================================================

/// Point-in-time view of the session, used for `GET /status` and for
/// replaying current state to newly connected realtime subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current connection status.
    pub status: ConnectionStatus,

    /// Pending pairing code, present only while a new pairing is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
}

// =============================================================================
// HTTP API Payloads
// =============================================================================

/// Request body of `POST /messages/send`.
///
/// Both fields are optional at the serde layer so a missing field reaches
/// the validation layer (and produces a 400 with a JSON body) instead of a
/// deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SendRequest {
    /// Recipient: a bare number (`5511999999999`) or a full JID.
    #[serde(default)]
    pub number: Option<String>,

    /// Message text to deliver.
    #[serde(default)]
    pub message: Option<String>,
}

/// Response body of `POST /messages/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    /// Whether the message was handed to the protocol client.
    pub success: bool,

    /// Human-readable confirmation, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Human-readable failure description, present on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResponse {
    /// Successful send.
    pub fn ok(message: impl Into<String>) -> Self {
        SendResponse {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Failed send.
    pub fn err(error: impl Into<String>) -> Self {
        SendResponse {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Connecting).unwrap(),
            json!("connecting")
        );
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Open).unwrap(),
            json!("open")
        );
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Close).unwrap(),
            json!("close")
        );
    }

    #[test]
    fn test_status_display_matches_wire_form() {
        assert_eq!(ConnectionStatus::Open.to_string(), "open");
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
    }

    #[test]
    fn test_relay_event_wire_shapes() {
        let qr = RelayEvent::Qr("2@AbC".into());
        assert_eq!(
            serde_json::to_value(&qr).unwrap(),
            json!({"event": "qr", "data": "2@AbC"})
        );

        let update = RelayEvent::ConnectionUpdate(ConnectionUpdate {
            status: ConnectionStatus::Open,
        });
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"event": "connectionUpdate", "data": {"status": "open"}})
        );

        let msg = RelayEvent::NewMessage(json!({"key": {"remoteJid": "x@s.whatsapp.net"}}));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "event": "newMessage",
                "data": {"key": {"remoteJid": "x@s.whatsapp.net"}}
            })
        );
    }

    #[test]
    fn test_snapshot_omits_absent_qr() {
        let snapshot = StatusSnapshot {
            status: ConnectionStatus::Open,
            qr: None,
        };
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({"status": "open"})
        );

        let snapshot = StatusSnapshot {
            status: ConnectionStatus::Connecting,
            qr: Some("2@AbC".into()),
        };
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({"status": "connecting", "qr": "2@AbC"})
        );
    }

    #[test]
    fn test_send_request_tolerates_missing_fields() {
        let req: SendRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.number.is_none());
        assert!(req.message.is_none());

        let req: SendRequest =
            serde_json::from_value(json!({"number": "5511999999999", "message": "hi"})).unwrap();
        assert_eq!(req.number.as_deref(), Some("5511999999999"));
        assert_eq!(req.message.as_deref(), Some("hi"));
    }

    #[test]
    fn test_send_response_shapes() {
        assert_eq!(
            serde_json::to_value(SendResponse::ok("Mensagem enviada.")).unwrap(),
            json!({"success": true, "message": "Mensagem enviada."})
        );
        assert_eq!(
            serde_json::to_value(SendResponse::err("nope")).unwrap(),
            json!({"success": false, "error": "nope"})
        );
    }
}
