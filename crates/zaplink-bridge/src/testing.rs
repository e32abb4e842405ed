//! Test doubles for the wire seam.
//!
//! The mock connector plays the protocol engine's role in unit tests:
//! tests push [`WireEvent`]s through it and inspect what the session sent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::{BridgeError, BridgeResult};
use crate::wire::{ConnectRequest, WireClient, WireConnector, WireEvent, WireVersion};

/// Scripted [`WireConnector`]. Each successful `connect` opens a fresh
/// event channel; [`MockConnector::emit`] feeds the latest one.
pub(crate) struct MockConnector {
    connects: AtomicUsize,
    fail_connect: AtomicBool,
    client: Arc<MockClient>,
    events: Mutex<Option<mpsc::Sender<WireEvent>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        MockConnector {
            connects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            client: Arc::new(MockClient::new()),
            events: Mutex::new(None),
        }
    }

    /// Number of `connect` calls (successful or not).
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Makes subsequent `connect` calls fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// The shared mock client handed out by `connect`.
    pub fn client(&self) -> Arc<MockClient> {
        self.client.clone()
    }

    /// Pushes an event through the most recent connection.
    pub async fn emit(&self, event: WireEvent) {
        let tx = self
            .events
            .lock()
            .await
            .clone()
            .expect("no live connection to emit on");
        tx.send(event).await.expect("event receiver dropped");
    }
}

#[async_trait]
impl WireConnector for MockConnector {
    async fn negotiate_version(&self) -> BridgeResult<WireVersion> {
        Ok(WireVersion::fallback())
    }

    async fn connect(
        &self,
        _request: ConnectRequest,
    ) -> BridgeResult<(Arc<dyn WireClient>, mpsc::Receiver<WireEvent>)> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(BridgeError::ConnectionFailed("mock refused".into()));
        }

        let (tx, rx) = mpsc::channel(32);
        *self.events.lock().await = Some(tx);
        let client: Arc<dyn WireClient> = self.client.clone();
        Ok((client, rx))
    }
}

/// Recording [`WireClient`].
pub(crate) struct MockClient {
    sent: Mutex<Vec<(String, String)>>,
    fail_sends: AtomicBool,
}

impl MockClient {
    fn new() -> Self {
        MockClient {
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// (jid, text) pairs delivered so far.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    /// Makes subsequent sends fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WireClient for MockClient {
    async fn send_text(&self, jid: &str, text: &str) -> BridgeResult<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BridgeError::SendFailed("mock delivery failure".into()));
        }
        self.sent
            .lock()
            .await
            .push((jid.to_string(), text.to_string()));
        Ok(())
    }
}
