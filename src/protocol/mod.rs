//! Chat frame formats.
//!
//! The channel treats frames as opaque text; these types describe what
//! the chat server actually puts inside them.
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`InboundMessage`] | Server → Client | Chat line with sender and digest |
//! | [`OutboundMessage`] | Client → Server | Chat line, optional auth token |
//! | [`Receipt`] | Client → Server | Read receipt for a digest |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `inbound` | Server-to-client records |
//! | `outbound` | Client-to-server records |

// ============================================================================
// Submodules
// ============================================================================

/// Server-to-client records.
pub mod inbound;

/// Client-to-server records.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use inbound::{InboundMessage, SYSTEM_SENDER};
pub use outbound::{OutboundMessage, Receipt};
