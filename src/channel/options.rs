//! Channel options.
//!
//! Plain configuration values; see [`ChannelBuilder`](super::ChannelBuilder)
//! for the fluent API that fills them in.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use super::backoff::DEFAULT_MAX_BACKOFF;

// ============================================================================
// ChannelOptions
// ============================================================================

/// Tunables for a [`Channel`](super::Channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Log lifecycle events and received frames at `info` instead of `trace`.
    pub verbose: bool,
    /// Reconnect after unexpected closes.
    pub reconnect: bool,
    /// WebSocket subprotocol to request.
    pub protocol: Option<String>,
    /// Upper bound on the reconnect delay.
    pub max_backoff: Duration,
    /// Reset the attempt counter after each successful open.
    pub reset_backoff_on_open: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            reconnect: true,
            protocol: None,
            max_backoff: DEFAULT_MAX_BACKOFF,
            reset_backoff_on_open: false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ChannelOptions::default();
        assert!(!options.verbose);
        assert!(options.reconnect);
        assert!(options.protocol.is_none());
        assert_eq!(options.max_backoff, Duration::from_secs(30));
        assert!(!options.reset_backoff_on_open);
    }
}
