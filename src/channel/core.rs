//! Channel handle and event loop.
//!
//! [`Channel::open`] spawns one tokio task that owns the transport. The
//! handle methods are synchronous: they decide under the machine lock
//! and hand outbound frames to the task through an unbounded queue, so
//! they never block and can be called from inside the message callback.
//!
//! # Event Loop
//!
//! ```text
//! Connecting ──► pump frames while Open ──► backoff sleep ──┐
//!     ▲                                                      │
//!     └──────────────────────────────────────────────────────┘
//! ```
//!
//! Outbound frames carry the connection generation they were accepted
//! for; frames left in the queue when a connection drops are discarded
//! rather than replayed on the next one.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::to_string;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, Digest};
use crate::protocol::{OutboundMessage, Receipt};
use crate::transport::{Connector, FrameReader, FrameWriter};

use super::backoff::Backoff;
use super::builder::ChannelBuilder;
use super::options::ChannelOptions;
use super::state::{ChannelState, CloseTransition, Machine, Slot, SubmitOutcome, Ticket};

// ============================================================================
// Types
// ============================================================================

/// Consumer callback, invoked once per inbound text frame.
pub type MessageHandler = Box<dyn Fn(String) + Send + Sync>;

/// Logs at `info` when verbose, `trace` otherwise.
macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            trace!($($arg)+);
        }
    };
}

// ============================================================================
// ChannelCommand
// ============================================================================

/// Internal commands for the event loop.
enum ChannelCommand {
    /// Write a frame if its connection generation is still current.
    Transmit { ticket: Ticket, text: String },
    /// Release the transport and stop.
    Close,
}

/// Why the frame pump returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    /// Transport closed or failed on its own.
    Lost,
    /// Local close or every handle dropped.
    Shutdown,
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between handles and the event loop.
struct Shared {
    endpoint: Endpoint,
    options: ChannelOptions,
    connector: Arc<dyn Connector>,
    handler: MessageHandler,
    machine: Mutex<Machine>,
    state_tx: watch::Sender<ChannelState>,
}

impl Shared {
    /// Runs `f` on the machine and publishes the resulting state.
    fn transition<T>(&self, f: impl FnOnce(&mut Machine) -> T) -> T {
        let mut machine = self.machine.lock();
        let result = f(&mut machine);
        let state = machine.state();
        self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        result
    }

    fn state(&self) -> ChannelState {
        self.machine.lock().state()
    }

    /// Reports a claimed frame as written or discarded.
    fn settle(&self, ticket: Ticket, text: &str, written: bool) {
        self.machine.lock().settle(ticket, text, written);
    }

    /// Enters `ClosedFinal` from the loop side.
    fn finish(&self) {
        self.transition(Machine::close);
        debug!(endpoint = %self.endpoint, "Event loop terminated");
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Resilient text-message channel to one endpoint.
///
/// Delivers inbound frames to the handler, sends outbound frames while
/// the transport is open, and reconnects after unexpected closes with
/// capped exponential backoff until [`close`](Self::close) is called.
///
/// # Thread Safety
///
/// `Channel` is `Send + Sync` and cheap to clone; clones share the same
/// connection. The event loop stops once every clone is dropped.
pub struct Channel {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
    /// Receiver waiting to be moved into the event loop by `open()`.
    pending_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ChannelCommand>>>>,
    shared: Arc<Shared>,
}

impl Clone for Channel {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            pending_rx: Arc::clone(&self.pending_rx),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.shared.endpoint)
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Creates a builder for configuring a channel.
    #[inline]
    #[must_use]
    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::new()
    }

    /// Creates a channel in the `Connecting` state without starting it.
    pub(crate) fn new(
        endpoint: Endpoint,
        handler: MessageHandler,
        connector: Arc<dyn Connector>,
        options: ChannelOptions,
    ) -> Self {
        let machine = Machine::new(
            options.reconnect,
            Backoff::new(options.max_backoff),
            options.reset_backoff_on_open,
        );
        let (state_tx, _) = watch::channel(machine.state());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            endpoint,
            options,
            connector,
            handler,
            machine: Mutex::new(machine),
            state_tx,
        });

        Self {
            command_tx,
            pending_rx: Arc::new(Mutex::new(Some(command_rx))),
            shared,
        }
    }

    /// Starts the event loop, which connects the transport.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] if the channel was already closed
    /// - [`Error::AlreadyOpened`] if `open()` was called before
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn open(&self) -> Result<()> {
        if self.state().is_final() {
            return Err(Error::ChannelClosed);
        }

        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("open() requires a tokio runtime: {e}")))?;
        let command_rx = self.pending_rx.lock().take().ok_or(Error::AlreadyOpened)?;

        runtime.spawn(run_event_loop(Arc::clone(&self.shared), command_rx));

        debug!(endpoint = %self.shared.endpoint, "Channel opened");
        Ok(())
    }

    /// Submits a text payload.
    ///
    /// Queued for transmission only if the transport is open and the
    /// payload is non-empty and differs from the last transmitted one.
    /// Safe to call repeatedly with an unchanged value.
    pub fn submit(&self, payload: impl AsRef<str>) -> SubmitOutcome {
        let payload = payload.as_ref();
        let mut machine = self.shared.machine.lock();

        let outcome = machine.submit(payload);
        if outcome.is_sent() {
            // Enqueue under the lock so queue order matches claim order
            let _ = self.command_tx.send(ChannelCommand::Transmit {
                ticket: machine.ticket(Slot::Message),
                text: payload.to_owned(),
            });
        } else {
            trace!(?outcome, "Submit dropped");
        }

        outcome
    }

    /// Serializes and submits a chat message.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if serialization fails.
    pub fn send_message(&self, message: &OutboundMessage) -> Result<SubmitOutcome> {
        let payload = to_string(message)?;
        Ok(self.submit(payload))
    }

    /// Sends a read receipt for `digest`.
    ///
    /// Receipts are deduplicated separately from chat payloads.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if serialization fails.
    pub fn acknowledge(&self, digest: &Digest) -> Result<SubmitOutcome> {
        if digest.is_empty() {
            return Ok(SubmitOutcome::Empty);
        }

        let payload = to_string(&Receipt::new(digest.clone()))?;
        let mut machine = self.shared.machine.lock();

        let outcome = machine.acknowledge(&payload);
        if outcome.is_sent() {
            let _ = self.command_tx.send(ChannelCommand::Transmit {
                ticket: machine.ticket(Slot::Receipt),
                text: payload,
            });
        }

        Ok(outcome)
    }

    /// Disables reconnection and closes the transport.
    ///
    /// Cancels any pending reconnect. Idempotent.
    pub fn close(&self) {
        if self.shared.transition(Machine::close) {
            lifecycle!(self.shared.options.verbose, endpoint = %self.shared.endpoint, "Channel closed");
            let _ = self.command_tx.send(ChannelCommand::Close);
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    /// Returns the reconnect attempt counter (starts at 1).
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.shared.machine.lock().attempts()
    }

    /// Returns the endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Returns the options the channel was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ChannelOptions {
        &self.shared.options
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Connect, pump, back off, repeat.
async fn run_event_loop(
    shared: Arc<Shared>,
    mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
) {
    let verbose = shared.options.verbose;

    loop {
        let attempt = shared.machine.lock().attempts();
        debug!(endpoint = %shared.endpoint, attempt, "Connecting");

        // Connecting
        let Some(result) = connect(&shared, &mut command_rx).await else {
            shared.finish();
            return;
        };

        match result {
            Ok((mut writer, reader)) => {
                let Some(generation) = shared.transition(Machine::on_open) else {
                    // Closed while the connect was in flight
                    let _ = writer.close().await;
                    shared.finish();
                    return;
                };

                let connection = ConnectionId::generate();
                lifecycle!(verbose, %connection, endpoint = %shared.endpoint, "WebSocket connected");

                let exit = pump(&shared, generation, writer, reader, &mut command_rx).await;

                lifecycle!(verbose, %connection, ?exit, "WebSocket disconnected");

                if exit == PumpExit::Shutdown {
                    shared.finish();
                    return;
                }
            }

            Err(e) => {
                lifecycle!(verbose, endpoint = %shared.endpoint, error = %e, "Connect failed");
            }
        }

        // Unexpected close
        match shared.transition(Machine::on_close) {
            CloseTransition::Final => {
                shared.finish();
                return;
            }

            CloseTransition::Retry { delay, attempt } => {
                lifecycle!(verbose, attempt, delay_secs = delay.as_secs(), "Reconnect scheduled");

                let sleep = tokio::time::sleep(delay);
                tokio::pin!(sleep);

                let fired = loop {
                    tokio::select! {
                        () = &mut sleep => break true,

                        command = command_rx.recv() => match command {
                            Some(ChannelCommand::Transmit { ticket, text }) => {
                                trace!("Dropping frame queued for a closed connection");
                                shared.settle(ticket, &text, false);
                            }
                            Some(ChannelCommand::Close) | None => break false,
                        }
                    }
                };

                if !fired || !shared.transition(Machine::on_timer) {
                    shared.finish();
                    return;
                }
            }
        }
    }
}

/// Drives one connect attempt.
///
/// Returns `None` if the channel was closed while connecting.
async fn connect(
    shared: &Shared,
    command_rx: &mut mpsc::UnboundedReceiver<ChannelCommand>,
) -> Option<Result<(Box<dyn FrameWriter>, Box<dyn FrameReader>)>> {
    let connect = shared
        .connector
        .connect(&shared.endpoint, shared.options.protocol.as_deref());
    tokio::pin!(connect);

    loop {
        tokio::select! {
            result = &mut connect => return Some(result),

            command = command_rx.recv() => match command {
                Some(ChannelCommand::Transmit { ticket, text }) => {
                    trace!("Dropping frame queued for a closed connection");
                    shared.settle(ticket, &text, false);
                }
                Some(ChannelCommand::Close) | None => return None,
            }
        }
    }
}

/// Moves frames between the transport and the channel until either side
/// ends the connection.
async fn pump(
    shared: &Shared,
    generation: u64,
    mut writer: Box<dyn FrameWriter>,
    mut reader: Box<dyn FrameReader>,
    command_rx: &mut mpsc::UnboundedReceiver<ChannelCommand>,
) -> PumpExit {
    let verbose = shared.options.verbose;

    loop {
        tokio::select! {
            // Incoming frames from the server
            frame = reader.next_text() => match frame {
                Some(Ok(text)) => {
                    if shared.state().is_final() {
                        let _ = writer.close().await;
                        return PumpExit::Shutdown;
                    }

                    lifecycle!(verbose, frame = %text, "Frame received");
                    (shared.handler)(text);
                }

                Some(Err(e)) => {
                    warn!(error = %e, "Transport error");
                    return PumpExit::Lost;
                }

                None => {
                    debug!("Transport closed by remote");
                    return PumpExit::Lost;
                }
            },

            // Commands from handles
            command = command_rx.recv() => match command {
                Some(ChannelCommand::Transmit { ticket, text }) => {
                    if ticket.generation != generation {
                        trace!(frame_generation = ticket.generation, generation, "Dropping stale frame");
                        shared.settle(ticket, &text, false);
                        continue;
                    }

                    if let Err(e) = writer.send_text(text.clone()).await {
                        warn!(error = %e, "Failed to send frame");
                        shared.settle(ticket, &text, false);
                        return PumpExit::Lost;
                    }
                    shared.settle(ticket, &text, true);
                    trace!(generation, "Frame sent");
                }

                Some(ChannelCommand::Close) | None => {
                    if let Err(e) = writer.close().await {
                        debug!(error = %e, "Error while closing transport");
                    }
                    return PumpExit::Shutdown;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
