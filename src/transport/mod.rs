//! Duplex text-frame transport.
//!
//! The channel's event loop talks to the network only through the traits
//! in this module, so the same reconnect logic drives a real WebSocket
//! and the in-process [`memory`] transport used in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   connect()   ┌──────────────┐
//! │  Channel         │──────────────►│  Connector   │
//! │  (event loop)    │               └──────┬───────┘
//! │                  │   FrameWriter        │ Link
//! │                  │◄────────────────────-┘
//! │                  │   FrameReader
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite client connector |
//! | `memory` | In-process connector and listener |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport.
pub mod memory;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use websocket::WsConnector;

// ============================================================================
// Types
// ============================================================================

/// Both halves of an open connection.
pub type Link = (Box<dyn FrameWriter>, Box<dyn FrameReader>);

// ============================================================================
// Traits
// ============================================================================

/// Opens transport connections to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establishes one connection.
    ///
    /// `protocol` is the optional subprotocol to negotiate.
    ///
    /// # Errors
    ///
    /// Any error is treated by the channel like an unexpected close.
    async fn connect(&self, endpoint: &Endpoint, protocol: Option<&str>) -> Result<Link>;
}

/// Write half of a connection.
#[async_trait]
pub trait FrameWriter: Send {
    /// Writes one text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Closes the connection from the local side.
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Waits for the next text frame.
    ///
    /// Returns `None` once the peer has closed the connection. Must be
    /// cancel safe: dropping the future loses no frame.
    async fn next_text(&mut self) -> Option<Result<String>>;
}
