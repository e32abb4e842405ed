//! # Engine Socket Connector
//!
//! Production implementation of the wire seam: a WebSocket link to the
//! protocol engine process.
//!
//! ## Link Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Socket Link                                 │
//! │                                                                         │
//! │  connect(request)                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  dial engine_url (with timeout) ──► send init frame                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────────── link task (select loop) ────────────────────┐   │
//! │  │                                                                  │   │
//! │  │  outgoing frames ──► socket          socket ──► engine frames   │   │
//! │  │  (sendText)                                      │               │   │
//! │  │                                                  ▼               │   │
//! │  │  keepalive ping ───► socket          connectionUpdate → event   │   │
//! │  │                                      credsUpdate      → event   │   │
//! │  │                                      messagesUpsert   → event   │   │
//! │  │                                      sendResult → pending ack   │   │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │       │                                                                 │
//! │       ▼  socket drops without a close event                            │
//! │  synthesize Lifecycle{close, connection_lost} so the reconnect         │
//! │  policy also covers engine crashes                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{interval, timeout, Duration};
use tokio_tungstenite::tungstenite::{Bytes, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use zaplink_core::ConnectionStatus;

use crate::config::WireSettings;
use crate::engine::{EngineFrame, InitPayload, SendResultPayload, SendTextPayload};
use crate::error::{BridgeError, BridgeResult};
use crate::wire::{
    ConnectRequest, DisconnectReason, LifecycleUpdate, WireClient, WireConnector, WireEvent,
    WireVersion,
};

/// Keepalive ping interval on the engine link.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Outgoing frame queue depth.
const OUTGOING_BUFFER: usize = 64;

/// Event stream queue depth.
const EVENT_BUFFER: usize = 100;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingAcks = Arc<Mutex<HashMap<Uuid, oneshot::Sender<SendResultPayload>>>>;

// =============================================================================
// Version Manifest
// =============================================================================

/// Shape of the wire-version manifest document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionManifest {
    version: [u32; 3],
    #[serde(default)]
    is_latest: bool,
}

// =============================================================================
// Socket Connector
// =============================================================================

/// [`WireConnector`] over the engine's WebSocket endpoint.
pub struct SocketConnector {
    settings: WireSettings,
    http: reqwest::Client,
}

impl SocketConnector {
    pub fn new(settings: WireSettings) -> Self {
        SocketConnector {
            settings,
            http: reqwest::Client::new(),
        }
    }

    /// Dials the engine with the configured timeout.
    async fn dial(&self) -> BridgeResult<WsStream> {
        let connect_future = connect_async(&self.settings.engine_url);

        match timeout(self.settings.connect_timeout(), connect_future).await {
            Ok(Ok((ws_stream, response))) => {
                debug!(status = ?response.status(), "Engine handshake complete");
                Ok(ws_stream)
            }
            Ok(Err(e)) => Err(BridgeError::from(e)),
            Err(_) => Err(BridgeError::Timeout(self.settings.connect_timeout_secs)),
        }
    }
}

#[async_trait]
impl WireConnector for SocketConnector {
    async fn negotiate_version(&self) -> BridgeResult<WireVersion> {
        let Some(ref url) = self.settings.version_url else {
            debug!("No version manifest configured, using baked-in wire version");
            return Ok(WireVersion::fallback());
        };

        let manifest = async {
            self.http
                .get(url.as_str())
                .send()
                .await?
                .error_for_status()?
                .json::<VersionManifest>()
                .await
        }
        .await;

        match manifest {
            Ok(manifest) => Ok(WireVersion {
                version: manifest.version,
                is_latest: manifest.is_latest,
            }),
            Err(e) => {
                warn!(error = %e, "Version manifest unreachable, using baked-in wire version");
                Ok(WireVersion::fallback())
            }
        }
    }

    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> BridgeResult<(Arc<dyn WireClient>, mpsc::Receiver<WireEvent>)> {
        let mut ws_stream = self.dial().await?;

        // Hand the engine everything it needs before any event flows
        let init = EngineFrame::Init(InitPayload {
            version: request.version,
            auth: request.creds,
            client: request.identity,
        });
        ws_stream.send(WsMessage::Text(init.to_json()?.into())).await?;

        info!(url = %self.settings.engine_url, "Engine link established");

        let (outgoing_tx, outgoing_rx) = mpsc::channel::<EngineFrame>(OUTGOING_BUFFER);
        let (event_tx, event_rx) = mpsc::channel::<WireEvent>(EVENT_BUFFER);
        let pending: PendingAcks = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(run_link(ws_stream, outgoing_rx, event_tx, pending.clone()));

        let client: Arc<dyn WireClient> = Arc::new(SocketClient {
            outgoing_tx,
            pending,
        });

        Ok((client, event_rx))
    }
}

// =============================================================================
// Socket Client
// =============================================================================

/// [`WireClient`] backed by the engine link.
pub struct SocketClient {
    outgoing_tx: mpsc::Sender<EngineFrame>,
    pending: PendingAcks,
}

#[async_trait]
impl WireClient for SocketClient {
    async fn send_text(&self, jid: &str, text: &str) -> BridgeResult<()> {
        let id = Uuid::new_v4();
        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, ack_tx);

        let frame = EngineFrame::SendText(SendTextPayload {
            id,
            jid: jid.to_string(),
            text: text.to_string(),
        });

        if self.outgoing_tx.send(frame).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(BridgeError::Disconnected);
        }

        // No enforced timeout here: in-flight sends ride on the transport's
        // own failure detection. If the link dies, the pending ack sender
        // is dropped and the await resolves with an error.
        match ack_rx.await {
            Ok(result) if result.ok => Ok(()),
            Ok(result) => Err(BridgeError::SendFailed(
                result.error.unwrap_or_else(|| "engine rejected send".into()),
            )),
            Err(_) => Err(BridgeError::Disconnected),
        }
    }
}

// =============================================================================
// Link Task
// =============================================================================

/// Runs one engine link until either side drops it.
async fn run_link(
    ws_stream: WsStream,
    mut outgoing_rx: mpsc::Receiver<EngineFrame>,
    event_tx: mpsc::Sender<WireEvent>,
    pending: PendingAcks,
) {
    let (mut write, mut read) = ws_stream.split();

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping_interval.tick().await; // first tick fires immediately, skip it

    // Set once the engine itself announced a close, so a dropped socket
    // afterwards does not synthesize a second close event.
    let mut saw_close = false;

    loop {
        tokio::select! {
            // Outgoing frames (sendText)
            outgoing = outgoing_rx.recv() => {
                match outgoing {
                    Some(frame) => {
                        let json = match frame.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize outgoing frame");
                                continue;
                            }
                        };
                        debug!(frame = %frame.type_name(), "Sending frame");
                        if write.send(WsMessage::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    // Client dropped: close the link politely
                    None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }

            // Incoming frames
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        match EngineFrame::from_json(&text) {
                            Ok(frame) => {
                                debug!(frame = %frame.type_name(), "Received frame");
                                if let EngineFrame::ConnectionUpdate(ref update) = frame {
                                    if update.connection == Some(ConnectionStatus::Close) {
                                        saw_close = true;
                                    }
                                }
                                if !dispatch_frame(frame, &event_tx, &pending).await {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to parse engine frame");
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if write.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        debug!("Received pong");
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "Engine closed the link");
                        break;
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        warn!("Received unexpected binary frame");
                    }
                    Some(Ok(WsMessage::Frame(_))) => {
                        // Raw frame, ignore
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Engine link error");
                        break;
                    }
                    None => {
                        info!("Engine link closed");
                        break;
                    }
                }
            }

            // Keepalive pings
            _ = ping_interval.tick() => {
                if write.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Fail any in-flight sends: dropping the senders resolves their awaits
    pending.lock().await.clear();

    // A link that died without an engine-announced close still needs to
    // surface as a disconnect so the reconnect policy kicks in.
    if !saw_close {
        let _ = event_tx
            .send(WireEvent::Lifecycle(LifecycleUpdate {
                connection: Some(ConnectionStatus::Close),
                qr: None,
                disconnect: Some(DisconnectReason::ConnectionLost),
            }))
            .await;
    }

    debug!("Engine link task stopped");
}

/// Routes one engine frame. Returns false when the event receiver is gone
/// and the link should shut down.
async fn dispatch_frame(
    frame: EngineFrame,
    event_tx: &mpsc::Sender<WireEvent>,
    pending: &PendingAcks,
) -> bool {
    let event = match frame {
        EngineFrame::ConnectionUpdate(update) => WireEvent::Lifecycle(update.into()),
        EngineFrame::CredsUpdate(update) => WireEvent::CredsRotated(update.auth),
        EngineFrame::MessagesUpsert(batch) => WireEvent::MessageBatch(batch.messages),
        EngineFrame::SendResult(result) => {
            match pending.lock().await.remove(&result.id) {
                Some(ack_tx) => {
                    let _ = ack_tx.send(result);
                }
                None => {
                    warn!(id = %result.id, "Acknowledgement for unknown send");
                }
            }
            return true;
        }
        unexpected @ (EngineFrame::Init(_) | EngineFrame::SendText(_)) => {
            warn!(frame = %unexpected.type_name(), "Unexpected frame from engine");
            return true;
        }
    };

    if event_tx.send(event).await.is_err() {
        warn!("Event receiver dropped, closing engine link");
        return false;
    }
    true
}
