//! Builder pattern for channel configuration.
//!
//! # Example
//!
//! ```no_run
//! use chat_channel::Channel;
//!
//! # fn example() -> chat_channel::Result<()> {
//! let channel = Channel::builder()
//!     .endpoint("ws://127.0.0.1:8000/chat/42/")
//!     .verbose(true)
//!     .on_message(|text| println!("received {text}"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{Connector, WsConnector};

use super::core::{Channel, MessageHandler};
use super::options::ChannelOptions;

// ============================================================================
// ChannelBuilder
// ============================================================================

/// Builder for configuring a [`Channel`].
///
/// Use [`Channel::builder()`] to create a new builder.
#[derive(Default)]
pub struct ChannelBuilder {
    /// Endpoint address, parsed at build time.
    endpoint: Option<String>,
    /// Consumer callback.
    handler: Option<MessageHandler>,
    /// Transport; WebSocket when unset.
    connector: Option<Arc<dyn Connector>>,
    options: ChannelOptions,
}

impl fmt::Debug for ChannelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBuilder")
            .field("endpoint", &self.endpoint)
            .field("handler", &self.handler.is_some())
            .field("connector", &self.connector.is_some())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// ChannelBuilder Implementation
// ============================================================================

impl ChannelBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint address (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, address: impl Into<String>) -> Self {
        self.endpoint = Some(address.into());
        self
    }

    /// Sets the callback invoked with every inbound text frame.
    ///
    /// Frames are passed through uninterpreted, in arrival order.
    #[inline]
    #[must_use]
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Enables verbose lifecycle logging. Default off.
    #[inline]
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    /// Enables automatic reconnection. Default on.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.options.reconnect = reconnect;
        self
    }

    /// Requests a WebSocket subprotocol.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.options.protocol = Some(protocol.into());
        self
    }

    /// Caps the reconnect delay. Default 30s.
    #[inline]
    #[must_use]
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.options.max_backoff = max;
        self
    }

    /// Resets the attempt counter after each successful open. Default off.
    #[inline]
    #[must_use]
    pub fn reset_backoff_on_open(mut self, reset: bool) -> Self {
        self.options.reset_backoff_on_open = reset;
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses a custom transport instead of [`WsConnector`].
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Builds the channel with validation.
    ///
    /// The channel is not connected until [`Channel::open`] is called.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if endpoint or handler is not set, the backoff
    ///   cap is zero, or the subprotocol is empty
    /// - [`Error::InvalidEndpoint`] / [`Error::Url`] if the endpoint is invalid
    pub fn build(self) -> Result<Channel> {
        let endpoint = self.validate_endpoint()?;
        self.validate_options()?;

        let handler = self.handler.ok_or_else(|| {
            Error::config(
                "Message handler is required. Use .on_message() to set it.\n\
                 Example: Channel::builder().on_message(|text| println!(\"{text}\"))",
            )
        })?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector));

        Ok(Channel::new(endpoint, handler, connector, self.options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ChannelBuilder {
    /// Validates the endpoint configuration.
    fn validate_endpoint(&self) -> Result<Endpoint> {
        let address = self.endpoint.as_deref().ok_or_else(|| {
            Error::config(
                "Endpoint is required. Use .endpoint() to set it.\n\
                 Example: Channel::builder().endpoint(\"ws://127.0.0.1:8000/chat/\")",
            )
        })?;

        Endpoint::parse(address)
    }

    /// Validates option values.
    fn validate_options(&self) -> Result<()> {
        if self.options.max_backoff.is_zero() {
            return Err(Error::config("max_backoff must be greater than zero"));
        }

        if self
            .options
            .protocol
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(Error::config("protocol must not be empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_builder_new() {
        let builder = ChannelBuilder::new();
        assert!(builder.endpoint.is_none());
        assert!(builder.handler.is_none());
        assert_eq!(builder.options, ChannelOptions::default());
    }

    #[test]
    fn test_builder_setters() {
        let builder = ChannelBuilder::new()
            .endpoint("ws://h/chat/")
            .verbose(true)
            .reconnect(false)
            .protocol("chat.v1")
            .max_backoff(Duration::from_secs(10))
            .reset_backoff_on_open(true);

        assert_eq!(builder.endpoint.as_deref(), Some("ws://h/chat/"));
        assert!(builder.options.verbose);
        assert!(!builder.options.reconnect);
        assert_eq!(builder.options.protocol.as_deref(), Some("chat.v1"));
        assert_eq!(builder.options.max_backoff, Duration::from_secs(10));
        assert!(builder.options.reset_backoff_on_open);
    }

    #[test]
    fn test_build_without_endpoint_fails() {
        let result = ChannelBuilder::new().on_message(|_| {}).build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_without_handler_fails() {
        let err = assert_err!(ChannelBuilder::new().endpoint("ws://h/").build());
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_with_bad_endpoint_fails() {
        let result = ChannelBuilder::new()
            .endpoint("https://h/")
            .on_message(|_| {})
            .build();
        assert!(matches!(result, Err(Error::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_build_with_zero_backoff_fails() {
        let result = ChannelBuilder::new()
            .endpoint("ws://h/")
            .max_backoff(Duration::ZERO)
            .on_message(|_| {})
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_with_empty_protocol_fails() {
        let result = ChannelBuilder::new()
            .endpoint("ws://h/")
            .protocol("  ")
            .on_message(|_| {})
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_succeeds() {
        let channel = assert_ok!(
            ChannelBuilder::new()
                .endpoint("ws://h/chat/")
                .on_message(|_| {})
                .build()
        );

        assert_eq!(channel.endpoint().as_str(), "ws://h/chat/");
    }
}
