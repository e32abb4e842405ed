//! # Gateway Module
//!
//! The HTTP API and realtime WebSocket surface, served from one axum
//! router.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gateway Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      Gateway (Axum)                             │   │
//! │  │                                                                 │   │
//! │  │  GET  /status         ──▶ session snapshot {status, qr?}       │   │
//! │  │  POST /messages/send  ──▶ validate ▶ availability ▶ deliver    │   │
//! │  │  GET  /health         ──▶ "OK"                                 │   │
//! │  │  GET  /ws             ──▶ WebSocket upgrade                    │   │
//! │  │                             │                                   │   │
//! │  │                             ▼                                   │   │
//! │  │                   ┌─────────────────┐                           │   │
//! │  │                   │   Subscriber    │ ◀── replay {status, qr?} │   │
//! │  │                   │     Handler     │ ◀── live relay events    │   │
//! │  │                   └─────────────────┘                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Send outcome mapping:                                                 │
//! │  ─────────────────────                                                 │
//! │  missing field      → 400  {success:false, error}                      │
//! │  session not open   → 503  {success:false, error}                      │
//! │  delivered          → 200  {success:true,  message}                    │
//! │  engine failure     → 500  {success:false, error}  (detail logged,    │
//! │                                                     never leaked)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use zaplink_core::validation::validate_send_request;
use zaplink_core::{RelayEvent, SendRequest, SendResponse, StatusSnapshot};

use crate::error::{BridgeError, BridgeResult};
use crate::relay::EventRelay;
use crate::session::SessionManager;

// =============================================================================
// Constants
// =============================================================================

/// Keepalive ping interval for realtime subscribers.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum accepted WebSocket message size (1MB).
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

// User-facing API strings. The surface is consumed by a Brazilian
// Portuguese frontend; keep the wording stable.
const MSG_SENT: &str = "Mensagem enviada.";
const ERR_REQUIRED: &str = "O número (number) e a mensagem (message) são obrigatórios.";
const ERR_UNAVAILABLE: &str = "Serviço indisponível. WhatsApp não está conectado.";
const ERR_INTERNAL: &str = "Falha interna ao enviar mensagem.";

// =============================================================================
// Gateway State
// =============================================================================

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The single session.
    pub session: SessionManager,

    /// Fan-out hub for realtime events.
    pub relay: EventRelay,
}

// =============================================================================
// Router & Server
// =============================================================================

/// Builds the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/messages/send", post(send_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the listener and serves until the shutdown future resolves.
pub async fn serve(
    bind_addr: &str,
    state: GatewayState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> BridgeResult<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| BridgeError::ConnectionFailed(format!("Failed to bind {}: {}", bind_addr, e)))?;

    info!(addr = %bind_addr, "Gateway started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;

    info!("Gateway stopped");
    Ok(())
}

// =============================================================================
// HTTP Handlers
// =============================================================================

/// `GET /health` - liveness probe.
async fn health_handler() -> &'static str {
    "OK"
}

/// `GET /status` - current connection status and pending pairing code.
async fn status_handler(State(state): State<GatewayState>) -> Json<StatusSnapshot> {
    Json(state.session.snapshot().await)
}

/// `POST /messages/send` - validates and delivers an outbound text.
async fn send_handler(
    State(state): State<GatewayState>,
    Json(request): Json<SendRequest>,
) -> (StatusCode, Json<SendResponse>) {
    // Validation first: a bad request is a bad request whatever the
    // session state
    let outbound = match validate_send_request(&request) {
        Ok(outbound) => outbound,
        Err(e) => {
            debug!(error = %e, "Rejected send request");
            return (
                StatusCode::BAD_REQUEST,
                Json(SendResponse::err(ERR_REQUIRED)),
            );
        }
    };

    match state.session.send_text(&outbound.recipient, &outbound.text).await {
        Ok(()) => (StatusCode::OK, Json(SendResponse::ok(MSG_SENT))),
        Err(e) if e.is_unavailable() => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SendResponse::err(ERR_UNAVAILABLE)),
        ),
        Err(e) => {
            // Logged server-side, opaque to the caller
            error!(error = %e, recipient = %outbound.recipient, "Send failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SendResponse::err(ERR_INTERNAL)),
            )
        }
    }
}

// =============================================================================
// Realtime Subscribers
// =============================================================================

/// `GET /ws` - WebSocket upgrade for realtime subscribers.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_subscriber(socket, state))
}

/// Events replayed to a freshly connected subscriber, so late joiners are
/// never missing current truth.
fn replay_events(snapshot: &StatusSnapshot) -> Vec<RelayEvent> {
    let mut events = vec![RelayEvent::ConnectionUpdate(zaplink_core::ConnectionUpdate {
        status: snapshot.status,
    })];
    if let Some(ref qr) = snapshot.qr {
        events.push(RelayEvent::Qr(qr.clone()));
    }
    events
}

/// Serves one realtime subscriber until it disconnects.
async fn handle_subscriber(socket: WebSocket, state: GatewayState) {
    let subscriber_id = Uuid::new_v4();
    info!(subscriber = %subscriber_id, "Realtime subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so nothing falls in the gap
    let mut events = state.relay.subscribe();

    // State replay: current status, plus the pairing code if one is pending
    let snapshot = state.session.snapshot().await;
    for event in replay_events(&snapshot) {
        if send_event(&mut sender, &event).await.is_err() {
            info!(subscriber = %subscriber_id, "Subscriber gone during replay");
            return;
        }
    }

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping_interval.tick().await; // first tick fires immediately, skip it

    loop {
        tokio::select! {
            // Live events
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Dropped events are acceptable: this is a live
                        // mirror, not a durable log
                        warn!(subscriber = %subscriber_id, missed, "Subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // Incoming traffic (subscribers don't talk, but handle control
            // frames and disconnects)
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) => {
                        info!(subscriber = %subscriber_id, "Subscriber requested close");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Text/binary/pong from subscribers is ignored
                    }
                    Some(Err(e)) => {
                        warn!(subscriber = %subscriber_id, error = %e, "Subscriber socket error");
                        break;
                    }
                    None => break,
                }
            }

            // Keepalive
            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(subscriber = %subscriber_id, "Realtime subscriber disconnected");
}

/// Serializes and sends one relay event.
async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &RelayEvent,
) -> Result<(), ()> {
    let json = serde_json::to_string(event).map_err(|e| {
        error!(error = %e, "Failed to serialize relay event");
    })?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creds::MemoryStore;
    use crate::session::{SessionManager, SessionSettings};
    use crate::testing::MockConnector;
    use crate::wire::{LifecycleUpdate, WireEvent};
    use std::sync::Arc;
    use zaplink_core::ConnectionStatus;

    async fn settle() {
        for _ in 0..25 {
            tokio::task::yield_now().await;
        }
    }

    fn make_state() -> (GatewayState, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::new());
        let relay = EventRelay::new();
        let session = SessionManager::new(
            SessionSettings {
                client_name: "Test".into(),
                reconnect_delay: Duration::from_secs(5),
            },
            Arc::new(MemoryStore::new()),
            connector.clone(),
            relay.clone(),
        );
        (GatewayState { session, relay }, connector)
    }

    async fn open_session(state: &GatewayState, connector: &Arc<MockConnector>) {
        state.session.connect().await.unwrap();
        connector
            .emit(WireEvent::Lifecycle(LifecycleUpdate {
                connection: Some(ConnectionStatus::Open),
                qr: None,
                disconnect: None,
            }))
            .await;
        settle().await;
    }

    fn send_body(number: Option<&str>, message: Option<&str>) -> SendRequest {
        SendRequest {
            number: number.map(str::to_string),
            message: message.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health_handler().await, "OK");
    }

    #[tokio::test]
    async fn test_status_reports_snapshot() {
        let (state, _) = make_state();
        let Json(snapshot) = status_handler(State(state)).await;
        assert_eq!(snapshot.status, ConnectionStatus::Connecting);
        assert_eq!(snapshot.qr, None);
    }

    #[tokio::test]
    async fn test_send_missing_field_is_400_and_never_reaches_client() {
        let (state, connector) = make_state();
        open_session(&state, &connector).await;

        for body in [
            send_body(None, Some("hi")),
            send_body(Some("5511999999999"), None),
            send_body(None, None),
            send_body(Some(""), Some("hi")),
        ] {
            let (status, Json(response)) =
                send_handler(State(state.clone()), Json(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(!response.success);
            assert_eq!(response.error.as_deref(), Some(ERR_REQUIRED));
        }

        assert!(connector.client().sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_while_connecting_is_503_and_never_reaches_client() {
        let (state, connector) = make_state();
        state.session.connect().await.unwrap();

        let (status, Json(response)) = send_handler(
            State(state.clone()),
            Json(send_body(Some("5511999999999"), Some("hi"))),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some(ERR_UNAVAILABLE));
        assert!(connector.client().sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_ok_is_200_with_confirmation() {
        let (state, connector) = make_state();
        open_session(&state, &connector).await;

        let (status, Json(response)) = send_handler(
            State(state.clone()),
            Json(send_body(Some("5511999999999"), Some("hi"))),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("Mensagem enviada."));
        assert_eq!(
            connector.client().sent().await,
            vec![("5511999999999@s.whatsapp.net".to_string(), "hi".to_string())]
        );
    }

    #[tokio::test]
    async fn test_send_engine_failure_is_opaque_500() {
        let (state, connector) = make_state();
        open_session(&state, &connector).await;
        connector.client().set_fail_sends(true);

        let (status, Json(response)) = send_handler(
            State(state),
            Json(send_body(Some("5511999999999"), Some("hi"))),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some(ERR_INTERNAL));
    }

    #[tokio::test]
    async fn test_replay_includes_pending_qr() {
        let snapshot = StatusSnapshot {
            status: ConnectionStatus::Connecting,
            qr: Some("2@AbC".into()),
        };
        let events = replay_events(&snapshot);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "connectionUpdate");
        assert_eq!(events[1], RelayEvent::Qr("2@AbC".into()));
    }

    #[tokio::test]
    async fn test_replay_without_qr_is_status_only() {
        let snapshot = StatusSnapshot {
            status: ConnectionStatus::Open,
            qr: None,
        };
        let events = replay_events(&snapshot);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "connectionUpdate");
    }
}
