//! Server-to-client records.
//!
//! # Format
//!
//! ```json
//! {
//!   "from_id": 12,
//!   "from": "Ada Lovelace",
//!   "message": "hello",
//!   "avatar": "//www.gravatar.com/avatar/0?d=mm&s=30",
//!   "digest": "5d41402abc4b2a76b9719d911017c592"
//! }
//! ```
//!
//! `from_id` is an empty string for anonymous senders.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, from_str};

use crate::error::Result;
use crate::identifiers::Digest;

// ============================================================================
// Constants
// ============================================================================

/// Sender name the server uses for notices.
pub const SYSTEM_SENDER: &str = "system";

// ============================================================================
// InboundMessage
// ============================================================================

/// A chat line broadcast by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender user id, if the sender is known.
    #[serde(default, deserialize_with = "sender_id")]
    pub from_id: Option<u64>,

    /// Sender display name.
    pub from: String,

    /// Message text.
    pub message: String,

    /// Sender avatar URL (scheme-relative).
    #[serde(default)]
    pub avatar: String,

    /// Digest to echo back in a read receipt.
    #[serde(default)]
    pub digest: Digest,
}

impl InboundMessage {
    /// Parses an inbound frame.
    ///
    /// # Errors
    ///
    /// [`Error::Json`](crate::Error::Json) if the frame is not a chat record.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(from_str(text)?)
    }

    /// Returns `true` for server notices.
    #[inline]
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.from == SYSTEM_SENDER
    }
}

/// Accepts a number, a numeric string, or an empty string.
fn sender_id<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;

    #[test]
    fn test_parse_full_record() {
        let text = r#"{
            "from_id": 12,
            "from": "Ada",
            "message": "hello",
            "avatar": "//a/b.png",
            "digest": "abc"
        }"#;

        let message = InboundMessage::parse(text).unwrap();
        assert_eq!(message.from_id, Some(12));
        assert_eq!(message.from, "Ada");
        assert_eq!(message.message, "hello");
        assert_eq!(message.avatar, "//a/b.png");
        assert_eq!(message.digest, Digest::new("abc"));
        assert!(!message.is_system());
    }

    #[test]
    fn test_parse_anonymous_sender() {
        let text = r#"{"from_id": "", "from": "Anonymous", "message": "hi"}"#;
        let message = InboundMessage::parse(text).unwrap();

        assert_eq!(message.from_id, None);
        assert!(message.digest.is_empty());
        assert!(message.avatar.is_empty());
    }

    #[test]
    fn test_parse_numeric_string_id() {
        let text = r#"{"from_id": "7", "from": "Bob", "message": "yo"}"#;
        assert_eq!(InboundMessage::parse(text).unwrap().from_id, Some(7));
    }

    #[test]
    fn test_system_notice() {
        let text = r#"{"from": "system", "message": "Bob joined"}"#;
        assert!(InboundMessage::parse(text).unwrap().is_system());
    }

    #[test]
    fn test_parse_rejects_non_record() {
        let err = InboundMessage::parse("plain text").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
