//! Client-to-server records.
//!
//! Chat line:
//! ```json
//! { "text": "hello", "token": "optional auth token" }
//! ```
//!
//! Read receipt:
//! ```json
//! { "received": "digest" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::Digest;

// ============================================================================
// OutboundMessage
// ============================================================================

/// A chat line sent by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message text.
    pub text: String,

    /// Auth token identifying the sender when the connection itself
    /// carries no session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl OutboundMessage {
    /// Creates a message without a token.
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            token: None,
        }
    }

    /// Attaches an auth token.
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

// ============================================================================
// Receipt
// ============================================================================

/// Acknowledges that the message with `received` digest was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Digest of the acknowledged message.
    pub received: Digest,
}

impl Receipt {
    /// Creates a receipt.
    #[inline]
    #[must_use]
    pub fn new(digest: Digest) -> Self {
        Self { received: digest }
    }
}

// ============================================================================
// Tests
// ============================================================================
