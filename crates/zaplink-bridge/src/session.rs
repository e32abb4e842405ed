//! # Session Manager
//!
//! Owns the single protocol client and drives its lifecycle.
//!
//! ## Session Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SessionManager Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                       SessionManager                             │  │
//! │  │                                                                  │  │
//! │  │  • Loads credentials, negotiates version, constructs the client  │  │
//! │  │  • Consumes wire events on a dedicated task                      │  │
//! │  │  • Applies the reconnect policy (single attempt, fixed delay)    │  │
//! │  │  • Exposes status snapshots and the outbound send path           │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ CredentialStore│  │ WireConnector  │  │      EventRelay        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ load on connect│  │ one client at  │  │ qr / connectionUpdate  │    │
//! │  │ save on rotate │  │ a time         │  │ / newMessage fan-out   │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  RECONNECT POLICY                                                      │
//! │  ────────────────                                                      │
//! │  close (non-logout) ──► wait fixed delay ──► one connect() attempt     │
//! │  close (logout)     ──► stay closed, drop client, await re-pairing     │
//! │                                                                         │
//! │  Two guards close the overlap races:                                   │
//! │  • `reconnect_pending`: two close events in one window → one attempt   │
//! │  • `connecting`: concurrent connect() calls collapse into one          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use zaplink_core::{jid, ConnectionStatus, StatusSnapshot};

use crate::config::WireSettings;
use crate::creds::CredentialStore;
use crate::error::{BridgeError, BridgeResult};
use crate::relay::EventRelay;
use crate::wire::{
    ClientIdentity, ConnectRequest, DisconnectReason, LifecycleUpdate, WireClient, WireConnector,
    WireEvent,
};

// =============================================================================
// Session Settings
// =============================================================================

/// Settings the session manager needs from the wire configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Client name presented during pairing.
    pub client_name: String,

    /// Fixed delay before the single reconnect attempt.
    pub reconnect_delay: Duration,
}

impl From<&WireSettings> for SessionSettings {
    fn from(wire: &WireSettings) -> Self {
        SessionSettings {
            client_name: wire.client_name.clone(),
            reconnect_delay: wire.reconnect_delay(),
        }
    }
}

// =============================================================================
// Session Manager
// =============================================================================

/// Orchestrator of the single protocol session.
///
/// Cheap to clone; all clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    settings: SessionSettings,
    store: Arc<dyn CredentialStore>,
    connector: Arc<dyn WireConnector>,
    relay: EventRelay,

    /// Process-wide connection status. Mutated only by the event loop and
    /// the reconnect path.
    status: RwLock<ConnectionStatus>,

    /// Pending pairing code; present only while a new pairing is required.
    qr: RwLock<Option<String>>,

    /// The live protocol client. At most one at a time.
    client: RwLock<Option<Arc<dyn WireClient>>>,

    /// Re-entrancy guard: one connect() in flight at a time.
    connecting: AtomicBool,

    /// One-shot guard: at most one scheduled reconnect attempt.
    reconnect_pending: AtomicBool,
}

impl SessionManager {
    /// Creates a session manager. Initial status is `connecting`; nothing
    /// happens until [`SessionManager::start`] or [`SessionManager::connect`].
    pub fn new(
        settings: SessionSettings,
        store: Arc<dyn CredentialStore>,
        connector: Arc<dyn WireConnector>,
        relay: EventRelay,
    ) -> Self {
        SessionManager {
            inner: Arc::new(SessionInner {
                settings,
                store,
                connector,
                relay,
                status: RwLock::new(ConnectionStatus::Connecting),
                qr: RwLock::new(None),
                client: RwLock::new(None),
                connecting: AtomicBool::new(false),
                reconnect_pending: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current connection status.
    pub async fn status(&self) -> ConnectionStatus {
        *self.inner.status.read().await
    }

    /// Point-in-time view for `GET /status` and subscriber replay.
    pub async fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: *self.inner.status.read().await,
            qr: self.inner.qr.read().await.clone(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects for process start: a dial failure is logged and retried on
    /// the reconnect schedule so the HTTP surface still comes up.
    pub async fn start(&self) {
        if let Err(e) = self.connect().await {
            warn!(error = %e, "Initial connect failed, will retry");
            self.transition(ConnectionStatus::Close).await;
            self.schedule_reconnect();
        }
    }

    /// Loads credentials, negotiates the wire version, and constructs the
    /// protocol client. Returns once the client object exists; the
    /// connection itself completes asynchronously via events.
    ///
    /// Re-entrant calls while a connect is in flight are no-ops, so there
    /// is never more than one live client.
    pub async fn connect(&self) -> BridgeResult<()> {
        if self
            .inner
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Connect already in progress");
            return Ok(());
        }

        let result = self.connect_inner().await;
        self.inner.connecting.store(false, Ordering::SeqCst);
        result
    }

    async fn connect_inner(&self) -> BridgeResult<()> {
        self.transition(ConnectionStatus::Connecting).await;

        let creds = self.inner.store.load().await?;
        info!(
            files = creds.len(),
            fresh = creds.is_empty(),
            "Credentials loaded"
        );

        let version = self.inner.connector.negotiate_version().await?;
        info!(version = %version, is_latest = version.is_latest, "Using wire version");

        let request = ConnectRequest {
            creds,
            version,
            identity: ClientIdentity::named(&self.inner.settings.client_name),
        };

        let (client, events) = self.inner.connector.connect(request).await?;
        *self.inner.client.write().await = Some(client);

        tokio::spawn(self.clone().run_events(events));
        Ok(())
    }

    /// Schedules the single reconnect attempt. A second close event inside
    /// the delay window finds the flag set and schedules nothing.
    fn schedule_reconnect(&self) {
        if self
            .inner
            .reconnect_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reconnect already scheduled");
            return;
        }

        let manager = self.clone();
        let delay = manager.inner.settings.reconnect_delay;
        debug!(?delay, "Reconnect scheduled");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.inner.reconnect_pending.store(false, Ordering::SeqCst);

            if let Err(e) = manager.connect().await {
                // A failed dial is just another transient disconnect
                warn!(error = %e, "Reconnect attempt failed");
                manager.transition(ConnectionStatus::Close).await;
                manager.schedule_reconnect();
            }
        });
    }

    /// Writes a status and announces it to subscribers.
    async fn transition(&self, status: ConnectionStatus) {
        *self.inner.status.write().await = status;
        self.inner.relay.emit_status(status);
    }

    // =========================================================================
    // Event Loop
    // =========================================================================

    /// Consumes the event stream of one protocol client. Ends when the
    /// client (or its link) goes away.
    async fn run_events(self, mut events: mpsc::Receiver<WireEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                WireEvent::Lifecycle(update) => self.handle_lifecycle(update).await,

                WireEvent::CredsRotated(state) => {
                    // One save per rotation event, no coalescing. Failures
                    // are logged: losing one rotation must not kill the
                    // session.
                    if let Err(e) = self.inner.store.save(&state).await {
                        error!(error = %e, "Failed to persist rotated credentials");
                    }
                }

                WireEvent::MessageBatch(messages) => {
                    // Forward the first message of the batch; empty batches
                    // are ignored.
                    if let Some(first) = messages.into_iter().next() {
                        let remote_jid = first
                            .pointer("/key/remoteJid")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown");
                        info!(remote_jid = %remote_jid, "Inbound message");
                        self.inner.relay.emit_message(first);
                    }
                }
            }
        }
        debug!("Event stream ended");
    }

    async fn handle_lifecycle(&self, update: LifecycleUpdate) {
        if let Some(connection) = update.connection {
            *self.inner.status.write().await = connection;
        }

        if let Some(code) = update.qr {
            info!("Pairing code issued, scan to link this device");
            *self.inner.qr.write().await = Some(code.clone());
            self.inner.relay.emit_qr(code);
        }

        match update.connection {
            Some(ConnectionStatus::Close) => {
                let reason = update.disconnect.unwrap_or(DisconnectReason::Unknown(0));
                if reason.is_terminal() {
                    // Logged out: the session is gone until re-pairing.
                    // The process stays up so /status can say so.
                    info!(
                        code = reason.code(),
                        "Logged out, not reconnecting; re-pairing required"
                    );
                    *self.inner.client.write().await = None;
                } else {
                    warn!(
                        code = reason.code(),
                        reason = ?reason,
                        "Connection closed, scheduling reconnect"
                    );
                    self.schedule_reconnect();
                }
            }
            Some(ConnectionStatus::Open) => {
                info!("WhatsApp session connected");
                // Pairing code is cleared exactly when the session opens
                *self.inner.qr.write().await = None;
            }
            _ => {}
        }

        // Announce the (possibly unchanged) status after every lifecycle
        // event, so subscribers always converge on current truth
        let status = *self.inner.status.read().await;
        self.inner.relay.emit_status(status);
    }

    // =========================================================================
    // Outbound Send
    // =========================================================================

    /// Delivers a text message.
    ///
    /// Refused with [`BridgeError::NotConnected`] unless the session is
    /// open and a client exists. A bare recipient identifier gets the user
    /// routing domain suffixed.
    pub async fn send_text(&self, recipient: &str, text: &str) -> BridgeResult<()> {
        if !self.status().await.is_open() {
            return Err(BridgeError::NotConnected);
        }

        let client = self
            .inner
            .client
            .read()
            .await
            .clone()
            .ok_or(BridgeError::NotConnected)?;

        let jid = jid::to_jid(recipient);
        client.send_text(&jid, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creds::{MemoryStore, SessionState};
    use crate::testing::MockConnector;
    use serde_json::json;
    use zaplink_core::RelayEvent;

    fn make_session() -> (
        SessionManager,
        Arc<MockConnector>,
        Arc<MemoryStore>,
        EventRelay,
    ) {
        let connector = Arc::new(MockConnector::new());
        let store = Arc::new(MemoryStore::new());
        let relay = EventRelay::new();
        let settings = SessionSettings {
            client_name: "Test".into(),
            reconnect_delay: Duration::from_secs(5),
        };
        let session = SessionManager::new(
            settings,
            store.clone(),
            connector.clone(),
            relay.clone(),
        );
        (session, connector, store, relay)
    }

    /// Yields enough times for spawned tasks to drain their queues.
    async fn settle() {
        for _ in 0..25 {
            tokio::task::yield_now().await;
        }
    }

    fn close_event(reason: DisconnectReason) -> WireEvent {
        WireEvent::Lifecycle(LifecycleUpdate {
            connection: Some(ConnectionStatus::Close),
            qr: None,
            disconnect: Some(reason),
        })
    }

    fn open_event() -> WireEvent {
        WireEvent::Lifecycle(LifecycleUpdate {
            connection: Some(ConnectionStatus::Open),
            qr: None,
            disconnect: None,
        })
    }

    fn qr_event(code: &str) -> WireEvent {
        WireEvent::Lifecycle(LifecycleUpdate {
            connection: None,
            qr: Some(code.to_string()),
            disconnect: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_close_schedules_exactly_one_reconnect() {
        let (session, connector, _, _) = make_session();
        session.connect().await.unwrap();
        assert_eq!(connector.connect_count(), 1);

        // Two close events inside one delay window
        connector.emit(close_event(DisconnectReason::ConnectionClosed)).await;
        connector.emit(close_event(DisconnectReason::ConnectionClosed)).await;
        settle().await;

        // Still inside the window: no attempt yet
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(session.status().await, ConnectionStatus::Close);

        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;

        // Exactly one attempt for both close events
        assert_eq!(connector.connect_count(), 2);

        // And no stragglers later
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_never_reconnects() {
        let (session, connector, _, _) = make_session();
        session.connect().await.unwrap();

        connector.emit(open_event()).await;
        settle().await;
        assert_eq!(session.status().await, ConnectionStatus::Open);

        connector.emit(close_event(DisconnectReason::LoggedOut)).await;
        settle().await;

        tokio::time::advance(Duration::from_secs(300)).await;
        settle().await;

        assert_eq!(connector.connect_count(), 1);
        assert_eq!(session.status().await, ConnectionStatus::Close);

        // The client is gone, so sends report unavailability
        let err = session.send_text("5511999999999", "hi").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_connect_failure_schedules_retry() {
        let (session, connector, _, _) = make_session();
        connector.set_fail_connect(true);

        session.start().await;
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(session.status().await, ConnectionStatus::Close);

        connector.set_fail_connect(false);
        settle().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;

        assert_eq!(connector.connect_count(), 2);
        assert_eq!(session.status().await, ConnectionStatus::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_stored_relayed_and_cleared_on_open() {
        let (session, connector, _, relay) = make_session();
        session.connect().await.unwrap();
        let mut rx = relay.subscribe();

        connector.emit(qr_event("2@AbC")).await;
        settle().await;

        assert_eq!(session.snapshot().await.qr.as_deref(), Some("2@AbC"));
        assert_eq!(rx.recv().await.unwrap(), RelayEvent::Qr("2@AbC".into()));

        connector.emit(open_event()).await;
        settle().await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.status, ConnectionStatus::Open);
        assert_eq!(snapshot.qr, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creds_rotation_saves_once_per_event() {
        let (session, connector, store, _) = make_session();
        session.connect().await.unwrap();

        let mut state = SessionState::new();
        state.insert("creds.json", json!({"k": 1}));
        connector.emit(WireEvent::CredsRotated(state.clone())).await;
        connector.emit(WireEvent::CredsRotated(state.clone())).await;
        connector.emit(WireEvent::CredsRotated(state.clone())).await;
        settle().await;

        assert_eq!(store.save_count(), 3);
        assert_eq!(store.state().await, state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_message_of_batch_forwarded_empty_ignored() {
        let (session, connector, _, relay) = make_session();
        session.connect().await.unwrap();
        let mut rx = relay.subscribe();

        connector.emit(WireEvent::MessageBatch(vec![])).await;
        settle().await;
        assert!(rx.try_recv().is_err(), "empty batch must emit nothing");

        let first = json!({"key": {"remoteJid": "a@s.whatsapp.net"}, "n": 1});
        let second = json!({"n": 2});
        connector
            .emit(WireEvent::MessageBatch(vec![first.clone(), second]))
            .await;
        settle().await;

        assert_eq!(rx.recv().await.unwrap(), RelayEvent::NewMessage(first));
        assert!(rx.try_recv().is_err(), "only the first message is forwarded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_open_session() {
        let (session, connector, _, _) = make_session();

        // Not even connected
        let err = session.send_text("5511999999999", "hi").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));

        // Connected but still connecting
        session.connect().await.unwrap();
        let err = session.send_text("5511999999999", "hi").await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
        assert!(connector.client().sent().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_suffixes_routing_domain() {
        let (session, connector, _, _) = make_session();
        session.connect().await.unwrap();
        connector.emit(open_event()).await;
        settle().await;

        session.send_text("5511999999999", "hi").await.unwrap();

        assert_eq!(
            connector.client().sent().await,
            vec![("5511999999999@s.whatsapp.net".to_string(), "hi".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_propagates() {
        let (session, connector, _, _) = make_session();
        session.connect().await.unwrap();
        connector.emit(open_event()).await;
        settle().await;

        connector.client().set_fail_sends(true);
        let err = session.send_text("5511999999999", "hi").await.unwrap_err();
        assert!(matches!(err, BridgeError::SendFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_always_reannounces_status() {
        let (session, connector, _, relay) = make_session();
        session.connect().await.unwrap();
        let mut rx = relay.subscribe();

        // A qr-only update still ends with a connectionUpdate broadcast
        connector.emit(qr_event("2@AbC")).await;
        settle().await;

        assert_eq!(rx.recv().await.unwrap(), RelayEvent::Qr("2@AbC".into()));
        match rx.recv().await.unwrap() {
            RelayEvent::ConnectionUpdate(update) => {
                assert_eq!(update.status, ConnectionStatus::Connecting)
            }
            other => panic!("expected connectionUpdate, got {:?}", other),
        }
    }
}
