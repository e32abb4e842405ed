//! # zaplink-bridge: Orchestration Shell for the Zaplink Gateway
//!
//! This crate bridges one WhatsApp Web protocol session to HTTP/WebSocket
//! consumers: it keeps the session alive, republishes its events to
//! realtime subscribers, and exposes a minimal HTTP API for status reads
//! and outbound sends.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Zaplink Bridge Architecture                       │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  SessionManager (Main Orchestrator)              │  │
//! │  │                                                                  │  │
//! │  │  Owns the single protocol client; loads credentials, negotiates │  │
//! │  │  the wire version, consumes lifecycle/creds/message events,     │  │
//! │  │  applies the reconnect policy, serves the send path             │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │CredentialStore │  │   Wire Seam    │  │      EventRelay        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ FileStore      │  │ SocketConnector│  │ broadcast fan-out to   │    │
//! │  │ CloudStore     │  │ over the engine│  │ realtime subscribers   │    │
//! │  │ (remote mirror)│  │ socket         │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────┬───────────┘    │
//! │                                                       │                │
//! │  ┌────────────────────────────────────────────────────▼───────────┐    │
//! │  │                     Gateway (axum)                             │    │
//! │  │                                                                │    │
//! │  │  GET /status │ POST /messages/send │ GET /ws │ GET /health    │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML + environment configuration
//! - [`creds`] - Session state and the local credential store
//! - [`remote`] - Remote object store and the cloud credential store
//! - [`wire`] - The seam to the external protocol engine
//! - [`engine`] - JSON frames exchanged with the engine
//! - [`socket`] - Production connector over the engine socket
//! - [`session`] - The session manager
//! - [`relay`] - Realtime event fan-out
//! - [`gateway`] - HTTP API and WebSocket surface
//! - [`error`] - Bridge error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zaplink_bridge::config::BridgeConfig;
//! use zaplink_bridge::creds::FileStore;
//! use zaplink_bridge::gateway::{self, GatewayState};
//! use zaplink_bridge::relay::EventRelay;
//! use zaplink_bridge::session::SessionManager;
//! use zaplink_bridge::socket::SocketConnector;
//!
//! let config = BridgeConfig::load_or_default(None);
//! let relay = EventRelay::new();
//! let session = SessionManager::new(
//!     (&config.wire).into(),
//!     Arc::new(FileStore::new(&config.auth.dir)),
//!     Arc::new(SocketConnector::new(config.wire.clone())),
//!     relay.clone(),
//! );
//! session.start().await;
//! gateway::serve(&config.bind_address(), GatewayState { session, relay }, shutdown).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod creds;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod relay;
pub mod remote;
pub mod session;
pub mod socket;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::BridgeConfig;
pub use creds::{CredentialStore, FileStore, SessionState};
pub use error::{BridgeError, BridgeResult};
pub use gateway::GatewayState;
pub use relay::EventRelay;
pub use remote::{CloudStore, RemoteStore};
pub use session::{SessionManager, SessionSettings};
pub use socket::SocketConnector;
pub use wire::{DisconnectReason, WireClient, WireConnector, WireEvent, WireVersion};
