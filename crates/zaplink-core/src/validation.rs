//! # Validation Module
//!
//! Input validation for the send endpoint.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: serde deserialization                                        │
//! │  ├── Malformed JSON is rejected by the extractor                       │
//! │  └── Missing fields deserialize to None (checked here, not rejected)   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required-field checks (→ HTTP 400)                                │
//! │  └── Runs BEFORE any availability check, so a bad request is always    │
//! │      reported as a bad request, whatever the session state             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Session manager                                              │
//! │  └── Availability (status must be open) and delivery                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{ValidationError, ValidationResult};
use crate::types::SendRequest;

/// A validated outbound message: recipient identifier plus text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundText {
    /// Recipient as supplied by the caller (bare number or full JID).
    pub recipient: String,

    /// Message text.
    pub text: String,
}

/// Validates a send request.
///
/// ## Rules
/// - `number` must be present and non-blank
/// - `message` must be present and non-blank
///
/// Blank values fail the required check too: an empty string is neither a
/// routable recipient nor a deliverable message.
pub fn validate_send_request(request: &SendRequest) -> ValidationResult<OutboundText> {
    let recipient = required_field("number", request.number.as_deref())?;
    let text = required_field("message", request.message.as_deref())?;

    Ok(OutboundText {
        recipient: recipient.to_string(),
        text: text.to_string(),
    })
}

/// Checks that a field is present and non-blank.
fn required_field<'a>(field: &str, value: Option<&'a str>) -> ValidationResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::Required {
            field: field.to_string(),
        }),
    }
}
