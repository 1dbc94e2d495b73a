//! Type-safe identifiers.
//!
//! Newtype wrappers so a connection id and a receipt digest cannot be
//! mixed up with arbitrary strings.
//!
//! | Type | Wraps | Purpose |
//! |------|-------|---------|
//! | [`ConnectionId`] | `Uuid` | One transport connection (log correlation) |
//! | [`Digest`] | `String` | Read-receipt digest of a chat message |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier of one transport connection.
///
/// A fresh id is generated every time the channel (re)connects, so log
/// lines from different connections of the same channel can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a new random connection id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Digest
// ============================================================================

/// Read-receipt digest identifying a delivered chat message.
///
/// The server computes it per message; the client echoes it back in a
/// receipt once the message has been seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Wraps a digest string.
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the digest as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the digest is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Digest {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Digest {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }

    #[test]
    fn test_digest_serializes_transparently() {
        let digest = Digest::new("abc123");
        assert_eq!(serde_json::to_string(&digest).unwrap(), "\"abc123\"");

        let parsed: Digest = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(parsed, digest);
    }

    #[test]
    fn test_digest_display() {
        assert_eq!(Digest::from("d41d8cd9").to_string(), "d41d8cd9");
        assert!(Digest::default().is_empty());
    }
}
