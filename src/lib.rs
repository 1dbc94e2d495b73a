//! Chat Channel - resilient WebSocket messaging for chat clients.
//!
//! This library keeps one duplex text connection alive for the lifetime
//! of its owner: inbound frames go to a callback, outbound frames are
//! sent while the connection is open, and unexpected closes are retried
//! with capped exponential backoff.
//!
//! # Architecture
//!
//! - **Channel handle**: synchronous `open` / `submit` / `close`, cheap to clone
//! - **Event loop**: one tokio task owns the transport and the retry timer
//! - **State machine**: every decision lives in a sans-IO core, so
//!   cancellation and backoff are deterministic under test
//! - **Transport**: pluggable; WebSocket by default, in-memory for tests
//!
//! # Quick Start
//!
//! ```no_run
//! use chat_channel::{Channel, OutboundMessage, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let channel = Channel::builder()
//!         .endpoint("ws://127.0.0.1:8000/chat/42/")
//!         .verbose(true)
//!         .on_message(|text| println!("RECEIVED: {text}"))
//!         .build()?;
//!
//!     channel.open()?;
//!
//!     // No-op until the connection is open; repeated values are sent once
//!     channel.send_message(&OutboundMessage::new("hello"))?;
//!
//!     channel.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`channel`] | [`Channel`], builder, options, state machine, backoff |
//! | [`endpoint`] | [`Endpoint`] address validation |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Chat frame records |
//! | [`transcript`] | Consumer-side chat log |
//! | [`transport`] | Connector traits, WebSocket and in-memory transports |
//!
//! # Reconnect Schedule
//!
//! Retry `k` waits `min(30, 2^k - 1)` seconds: 1, 3, 7, 15, 30, 30, ...
//! Retries continue until [`Channel::close`] is called or reconnect was
//! disabled at build time.

// ============================================================================
// Modules
// ============================================================================

/// Resilient message channel.
///
/// - [`Channel`] - handle owning the connection
/// - [`ChannelBuilder`] - fluent configuration
/// - [`ChannelState`] - lifecycle states
pub mod channel;

/// WebSocket endpoint addresses.
pub mod endpoint;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Chat frame records.
pub mod protocol;

/// Consumer-side chat log.
pub mod transcript;

/// Duplex text-frame transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Channel types
pub use channel::{
    Backoff, Channel, ChannelBuilder, ChannelOptions, ChannelState, MessageHandler,
    SubmitOutcome,
};

// Endpoint
pub use endpoint::Endpoint;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, Digest};

// Protocol types
pub use protocol::{InboundMessage, OutboundMessage, Receipt};

// Transcript types
pub use transcript::{Entry, EntryKind, Transcript, VideoLink};

// Transport types
pub use transport::{Connector, FrameReader, FrameWriter, WsConnector};
