//! # Error Types
//!
//! Validation error types for zaplink-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  zaplink-core errors (this file)                                       │
//! │  └── ValidationError  - Input validation failures (→ HTTP 400)         │
//! │                                                                         │
//! │  zaplink-bridge errors (separate crate)                                │
//! │  └── BridgeError      - Transport, storage, session failures           │
//! │                                                                         │
//! │  Flow: ValidationError → 400 • BridgeError → 503/500 • ok → 200        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before the session layer runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., a recipient identifier that cannot be routed).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}
