//! # zaplink-core: Pure Types for the Zaplink Gateway
//!
//! This crate contains the domain vocabulary of the gateway as pure types
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Zaplink Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 HTTP / WebSocket Consumers                      │   │
//! │  │    dashboard ──► GET /status ──► POST /messages/send ──► /ws   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  zaplink-bridge (orchestration)                 │   │
//! │  │    session manager • credential store • relay • gateway        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ zaplink-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │    jid    │  │ validation│  │   error   │  │   │
//! │  │   │  Status   │  │ formatting│  │   rules   │  │ Validation│  │   │
//! │  │   │  Events   │  │  domains  │  │  checks   │  │  Error    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Connection status, realtime events, API payloads
//! - [`jid`] - Recipient identifier formatting
//! - [`error`] - Validation error types
//! - [`validation`] - Send request validation

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod jid;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use zaplink_core::ConnectionStatus` instead of
// `use zaplink_core::types::ConnectionStatus`

pub use error::{ValidationError, ValidationResult};
pub use types::*;
