//! Resilient message channel.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Capped exponential reconnect delay |
//! | `builder` | Fluent configuration |
//! | `core` | [`Channel`] handle and event loop |
//! | `options` | Option values and defaults |
//! | `state` | [`ChannelState`] and the sans-IO state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect backoff policy.
pub mod backoff;

/// Builder pattern for channel configuration.
pub mod builder;

/// Channel handle and event loop.
pub mod core;

/// Channel options.
pub mod options;

/// Channel state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::{Backoff, DEFAULT_MAX_BACKOFF};
pub use builder::ChannelBuilder;
pub use core::{Channel, MessageHandler};
pub use options::ChannelOptions;
pub use state::{ChannelState, SubmitOutcome};
