//! # Engine Frames
//!
//! Message types exchanged with the protocol engine over its socket.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Frame Protocol                            │
//! │                                                                         │
//! │  HANDSHAKE                                                             │
//! │  ─────────                                                             │
//! │  BRIDGE ───► init { version, auth, client }                            │
//! │                                                                         │
//! │  LIFECYCLE (engine → bridge)                                           │
//! │  ───────────────────────────                                           │
//! │  ENGINE ───► connectionUpdate { connection?, qr?, lastDisconnect? }    │
//! │  ENGINE ───► credsUpdate { auth }                                      │
//! │  ENGINE ───► messagesUpsert { messages: [...], kind }                  │
//! │                                                                         │
//! │  OUTBOUND SEND                                                         │
//! │  ─────────────                                                         │
//! │  BRIDGE ───► sendText { id, jid, text }                                │
//! │  ENGINE ───► sendResult { id, ok, error? }                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format (JSON)
//! Frames are serialized as adjacently tagged JSON:
//! ```json
//! { "type": "connectionUpdate", "payload": { "connection": "open" } }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use zaplink_core::ConnectionStatus;

use crate::creds::SessionState;
use crate::error::BridgeResult;
use crate::wire::{ClientIdentity, DisconnectReason, LifecycleUpdate, WireVersion};

// =============================================================================
// Main Frame Enum (Tagged Union)
// =============================================================================

/// All frames exchanged with the protocol engine.
///
/// Uses serde's adjacently tagged enum for clean JSON serialization:
/// `{ "type": "init", "payload": { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum EngineFrame {
    // =========================================================================
    // Bridge → Engine
    // =========================================================================
    /// Opens the session: version, credential material, pairing identity.
    Init(InitPayload),

    /// Requests delivery of a text message.
    SendText(SendTextPayload),

    // =========================================================================
    // Engine → Bridge
    // =========================================================================
    /// Connection lifecycle update.
    ConnectionUpdate(ConnectionUpdatePayload),

    /// Credential material rotated.
    CredsUpdate(CredsUpdatePayload),

    /// Inbound message batch.
    MessagesUpsert(MessagesUpsertPayload),

    /// Acknowledgement for a `sendText` frame.
    SendResult(SendResultPayload),
}

impl EngineFrame {
    /// Frame type name, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            EngineFrame::Init(_) => "init",
            EngineFrame::SendText(_) => "sendText",
            EngineFrame::ConnectionUpdate(_) => "connectionUpdate",
            EngineFrame::CredsUpdate(_) => "credsUpdate",
            EngineFrame::MessagesUpsert(_) => "messagesUpsert",
            EngineFrame::SendResult(_) => "sendResult",
        }
    }

    /// Serializes the frame to its JSON wire form.
    pub fn to_json(&self) -> BridgeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a frame from its JSON wire form.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// =============================================================================
// Handshake Payloads
// =============================================================================

/// Session-opening payload sent by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    /// Negotiated wire version.
    pub version: WireVersion,

    /// Credential material; empty for a fresh pairing.
    pub auth: SessionState,

    /// Pairing identity shown in the linked-devices list.
    pub client: ClientIdentity,
}

// =============================================================================
// Lifecycle Payloads
// =============================================================================

/// Close detail attached to a lifecycle update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectDetail {
    /// Protocol close code.
    pub code: u16,

    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Lifecycle update from the engine. Every field is optional: an update
/// may carry only a pairing code, only a status, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdatePayload {
    /// New connection status, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionStatus>,

    /// Freshly issued pairing code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,

    /// Close detail; present when `connection` is `close`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<DisconnectDetail>,
}

impl From<ConnectionUpdatePayload> for LifecycleUpdate {
    fn from(payload: ConnectionUpdatePayload) -> Self {
        LifecycleUpdate {
            connection: payload.connection,
            qr: payload.qr,
            disconnect: payload
                .last_disconnect
                .map(|d| DisconnectReason::from_code(d.code)),
        }
    }
}

/// Rotated credential material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredsUpdatePayload {
    /// Full session state after rotation.
    pub auth: SessionState,
}

/// Inbound message batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesUpsertPayload {
    /// Messages in arrival order. May be empty.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,

    /// Upsert kind as reported by the engine (`notify`, `append`, ...).
    #[serde(default)]
    pub kind: String,
}

// =============================================================================
// Send Payloads
// =============================================================================

/// Outbound text delivery request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextPayload {
    /// Correlation id, echoed back in the acknowledgement.
    pub id: Uuid,

    /// Destination JID.
    pub jid: String,

    /// Message text.
    pub text: String,
}

/// Acknowledgement for an outbound send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResultPayload {
    /// Correlation id of the acknowledged send.
    pub id: Uuid,

    /// Whether delivery was accepted.
    pub ok: bool,

    /// Failure detail when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_tag_shape() {
        let frame = EngineFrame::ConnectionUpdate(ConnectionUpdatePayload {
            connection: Some(ConnectionStatus::Open),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "connectionUpdate", "payload": {"connection": "open"}})
        );
    }

    #[test]
    fn test_frame_json_round_trip() {
        let frame = EngineFrame::SendText(SendTextPayload {
            id: Uuid::nil(),
            jid: "5511999999999@s.whatsapp.net".into(),
            text: "hi".into(),
        });
        let parsed = EngineFrame::from_json(&frame.to_json().unwrap()).unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(parsed.type_name(), "sendText");
    }

    #[test]
    fn test_close_frame_maps_to_lifecycle() {
        let payload: ConnectionUpdatePayload = serde_json::from_value(json!({
            "connection": "close",
            "lastDisconnect": {"code": 401, "message": "logged out"}
        }))
        .unwrap();

        let lifecycle: LifecycleUpdate = payload.into();
        assert_eq!(lifecycle.connection, Some(ConnectionStatus::Close));
        assert_eq!(lifecycle.disconnect, Some(DisconnectReason::LoggedOut));
    }

    #[test]
    fn test_qr_only_update_parses() {
        let payload: ConnectionUpdatePayload =
            serde_json::from_value(json!({"qr": "2@AbC"})).unwrap();
        let lifecycle: LifecycleUpdate = payload.into();
        assert_eq!(lifecycle.connection, None);
        assert_eq!(lifecycle.qr.as_deref(), Some("2@AbC"));
        assert_eq!(lifecycle.disconnect, None);
    }

    #[test]
    fn test_empty_batch_parses() {
        let frame = EngineFrame::from_json(
            r#"{"type": "messagesUpsert", "payload": {"messages": [], "kind": "notify"}}"#,
        )
        .unwrap();
        match frame {
            EngineFrame::MessagesUpsert(batch) => assert!(batch.messages.is_empty()),
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
