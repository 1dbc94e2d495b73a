//! Channel state machine.
//!
//! [`Machine`] holds every decision the channel makes and performs no
//! I/O: the event loop feeds it transport events and acts on what it
//! returns. This keeps reconnect and cancellation behavior deterministic.
//!
//! ```text
//!              open ok                 peer close / error
//! Connecting ──────────► Open ────────────────────────────► ClosedRetrying
//!     ▲    │                                                    │
//!     │    └──── connect failed ───────────────────────────────►│
//!     └──────────────────── backoff elapsed ────────────────────┘
//!
//! any state ── close() or close with reconnect disabled ──► ClosedFinal
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use super::backoff::Backoff;

// ============================================================================
// ChannelState
// ============================================================================

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Transport connect in progress.
    Connecting,
    /// Transport open; frames flow both ways.
    Open,
    /// Transport lost; a single reconnect timer is armed.
    ClosedRetrying,
    /// Terminal. No further connects.
    ClosedFinal,
}

impl ChannelState {
    /// Returns `true` if frames can be transmitted.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` for the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::ClosedFinal)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ClosedRetrying => "closed-retrying",
            Self::ClosedFinal => "closed-final",
        };
        f.write_str(name)
    }
}

// ============================================================================
// SubmitOutcome
// ============================================================================

/// What happened to a submitted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SubmitOutcome {
    /// Queued for transmission on the open connection.
    Sent,
    /// Same as the last transmitted payload; dropped.
    Duplicate,
    /// Empty payload; dropped.
    Empty,
    /// Transport not open; dropped.
    NotOpen,
}

impl SubmitOutcome {
    /// Returns `true` if the payload was queued.
    #[inline]
    #[must_use]
    pub const fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

// ============================================================================
// CloseTransition
// ============================================================================

/// Decision taken when the transport closes or fails to connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseTransition {
    /// Arm the reconnect timer.
    Retry {
        /// How long to wait.
        delay: Duration,
        /// Attempt count the delay was computed from.
        attempt: u32,
    },
    /// Stop for good.
    Final,
}

// ============================================================================
// Outbound Claims
// ============================================================================

/// Which dedup slot a claimed payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Message,
    Receipt,
}

/// Identifies one claimed payload on its way to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub(crate) slot: Slot,
    /// Unique per claim.
    pub(crate) seq: u64,
    /// Connection generation the claim was made on.
    pub(crate) generation: u64,
}

/// Single-slot dedup memory.
///
/// A payload only counts as transmitted once the event loop has written
/// it. Until then it sits in `pending`, so repeated submits of an
/// in-flight value still dedup, but a frame the loop discards does not
/// shadow the next submit of the same value.
#[derive(Debug, Default)]
struct DedupSlot {
    transmitted: Option<String>,
    /// Newest claim not yet settled by the event loop.
    pending: Option<(u64, String)>,
}

impl DedupSlot {
    /// The value the next payload is compared against.
    fn latest(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .map(|(_, payload)| payload.as_str())
            .or(self.transmitted.as_deref())
    }

    fn settle(&mut self, seq: u64, payload: &str, written: bool) {
        if written {
            self.transmitted = Some(payload.to_owned());
        }
        if self.pending.as_ref().is_some_and(|(pending, _)| *pending == seq) {
            self.pending = None;
        }
    }
}

// ============================================================================
// Machine
// ============================================================================

/// Sans-IO core of the channel.
#[derive(Debug)]
pub(crate) struct Machine {
    state: ChannelState,
    /// Starts at 1. Only grows unless `reset_on_open` is set.
    attempts: u32,
    reconnect: bool,
    reset_on_open: bool,
    backoff: Backoff,
    /// Bumped on every successful open.
    generation: u64,
    /// Last claim sequence number handed out.
    seq: u64,
    messages: DedupSlot,
    receipts: DedupSlot,
}

impl Machine {
    /// Creates a machine in the `Connecting` state.
    pub(crate) fn new(reconnect: bool, backoff: Backoff, reset_on_open: bool) -> Self {
        Self {
            state: ChannelState::Connecting,
            attempts: 1,
            reconnect,
            reset_on_open,
            backoff,
            generation: 0,
            seq: 0,
            messages: DedupSlot::default(),
            receipts: DedupSlot::default(),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> ChannelState {
        self.state
    }

    #[inline]
    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Transport reported open.
    ///
    /// Returns the new connection generation, or `None` if the channel
    /// was closed while the connect was in flight.
    pub(crate) fn on_open(&mut self) -> Option<u64> {
        if self.state != ChannelState::Connecting {
            return None;
        }

        self.state = ChannelState::Open;
        self.generation += 1;
        // Claims from earlier connections are never written
        self.messages.pending = None;
        self.receipts.pending = None;
        if self.reset_on_open {
            self.attempts = 1;
        }
        Some(self.generation)
    }

    /// Transport closed, errored, or failed to connect.
    pub(crate) fn on_close(&mut self) -> CloseTransition {
        if self.state.is_final() || !self.reconnect {
            self.state = ChannelState::ClosedFinal;
            return CloseTransition::Final;
        }

        self.state = ChannelState::ClosedRetrying;
        CloseTransition::Retry {
            delay: self.backoff.delay(self.attempts),
            attempt: self.attempts,
        }
    }

    /// Reconnect timer fired.
    ///
    /// Returns `true` if a new connect should start. The reconnect flag is
    /// checked here, at fire time, so a `close()` racing the timer wins.
    pub(crate) fn on_timer(&mut self) -> bool {
        if self.state != ChannelState::ClosedRetrying || !self.reconnect {
            self.state = ChannelState::ClosedFinal;
            return false;
        }

        self.attempts = self.attempts.saturating_add(1);
        self.state = ChannelState::Connecting;
        true
    }

    /// Claims a chat payload for transmission.
    pub(crate) fn submit(&mut self, payload: &str) -> SubmitOutcome {
        self.claim(Slot::Message, payload)
    }

    /// Claims a receipt payload for transmission.
    ///
    /// Receipts have their own slot so they never shadow a chat payload
    /// or the other way round.
    pub(crate) fn acknowledge(&mut self, payload: &str) -> SubmitOutcome {
        self.claim(Slot::Receipt, payload)
    }

    /// Ticket for the claim just made on `slot`.
    pub(crate) fn ticket(&self, slot: Slot) -> Ticket {
        Ticket {
            slot,
            seq: self.seq,
            generation: self.generation,
        }
    }

    /// Records what the event loop did with a claimed payload.
    ///
    /// `written` is `true` once the transport accepted the frame. A
    /// discarded frame leaves the slot as if it had never been claimed.
    pub(crate) fn settle(&mut self, ticket: Ticket, payload: &str, written: bool) {
        self.slot_mut(ticket.slot).settle(ticket.seq, payload, written);
    }

    /// Disables reconnection and enters `ClosedFinal`.
    ///
    /// Returns `true` if this call changed the state.
    pub(crate) fn close(&mut self) -> bool {
        self.reconnect = false;
        if self.state.is_final() {
            return false;
        }
        self.state = ChannelState::ClosedFinal;
        true
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut DedupSlot {
        match slot {
            Slot::Message => &mut self.messages,
            Slot::Receipt => &mut self.receipts,
        }
    }

    fn claim(&mut self, slot: Slot, payload: &str) -> SubmitOutcome {
        if payload.is_empty() {
            return SubmitOutcome::Empty;
        }
        if !self.state.is_open() {
            return SubmitOutcome::NotOpen;
        }
        if self.slot_mut(slot).latest() == Some(payload) {
            return SubmitOutcome::Duplicate;
        }

        self.seq += 1;
        let seq = self.seq;
        self.slot_mut(slot).pending = Some((seq, payload.to_owned()));
        SubmitOutcome::Sent
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn open_machine() -> Machine {
        let mut machine = Machine::new(true, Backoff::default(), false);
        assert_eq!(machine.on_open(), Some(1));
        machine
    }

    #[test]
    fn test_initial_state() {
        let machine = Machine::new(true, Backoff::default(), false);
        assert_eq!(machine.state(), ChannelState::Connecting);
        assert_eq!(machine.attempts(), 1);
        assert_eq!(machine.generation(), 0);
    }

    #[test]
    fn test_submit_while_connecting_is_dropped() {
        let mut machine = Machine::new(true, Backoff::default(), false);
        assert_eq!(machine.submit("hello"), SubmitOutcome::NotOpen);
    }

    #[test]
    fn test_submit_dedups_unchanged_payload() {
        let mut machine = open_machine();
        assert_eq!(machine.submit("hello"), SubmitOutcome::Sent);
        assert_eq!(machine.submit("hello"), SubmitOutcome::Duplicate);
        assert_eq!(machine.submit("hello"), SubmitOutcome::Duplicate);
    }

    #[test]
    fn test_submit_distinct_payloads() {
        let mut machine = open_machine();
        assert_eq!(machine.submit("one"), SubmitOutcome::Sent);
        assert_eq!(machine.submit("two"), SubmitOutcome::Sent);
        // single slot: going back to an older value sends again
        assert_eq!(machine.submit("one"), SubmitOutcome::Sent);
    }

    #[test]
    fn test_submit_empty() {
        let mut machine = open_machine();
        assert_eq!(machine.submit(""), SubmitOutcome::Empty);
    }

    #[test]
    fn test_receipt_slot_is_independent() {
        let mut machine = open_machine();
        assert_eq!(machine.submit("x"), SubmitOutcome::Sent);
        assert_eq!(machine.acknowledge("x"), SubmitOutcome::Sent);
        assert_eq!(machine.acknowledge("x"), SubmitOutcome::Duplicate);
        assert_eq!(machine.submit("x"), SubmitOutcome::Duplicate);
    }

    #[test]
    fn test_written_payload_stays_deduped() {
        let mut machine = open_machine();
        assert_eq!(machine.submit("hello"), SubmitOutcome::Sent);
        let ticket = machine.ticket(Slot::Message);

        machine.settle(ticket, "hello", true);
        assert_eq!(machine.submit("hello"), SubmitOutcome::Duplicate);
    }

    #[test]
    fn test_discarded_payload_can_be_resubmitted() {
        let mut machine = open_machine();
        assert_eq!(machine.submit("hello"), SubmitOutcome::Sent);
        let ticket = machine.ticket(Slot::Message);

        machine.on_close();
        machine.on_timer();
        machine.on_open();
        machine.settle(ticket, "hello", false);

        assert_eq!(machine.submit("hello"), SubmitOutcome::Sent);
    }

    #[test]
    fn test_discard_falls_back_to_last_written() {
        let mut machine = open_machine();
        assert_eq!(machine.submit("a"), SubmitOutcome::Sent);
        let first = machine.ticket(Slot::Message);
        machine.settle(first, "a", true);

        assert_eq!(machine.submit("b"), SubmitOutcome::Sent);
        let second = machine.ticket(Slot::Message);
        machine.settle(second, "b", false);

        assert_eq!(machine.submit("a"), SubmitOutcome::Duplicate);
        assert_eq!(machine.submit("b"), SubmitOutcome::Sent);
    }

    #[test]
    fn test_stale_discard_keeps_newer_claim() {
        let mut machine = open_machine();
        assert_eq!(machine.submit("x"), SubmitOutcome::Sent);
        let stale = machine.ticket(Slot::Message);

        machine.on_close();
        machine.on_timer();
        machine.on_open();
        assert_eq!(machine.submit("y"), SubmitOutcome::Sent);
        assert_eq!(machine.submit("x"), SubmitOutcome::Sent);

        // the old frame is discarded after "x" was claimed again
        machine.settle(stale, "x", false);
        assert_eq!(machine.submit("x"), SubmitOutcome::Duplicate);
    }

    #[test]
    fn test_discarded_receipt_leaves_message_slot() {
        let mut machine = open_machine();
        assert_eq!(machine.submit("m"), SubmitOutcome::Sent);
        assert_eq!(machine.acknowledge("r"), SubmitOutcome::Sent);
        let receipt = machine.ticket(Slot::Receipt);

        machine.settle(receipt, "r", false);
        assert_eq!(machine.acknowledge("r"), SubmitOutcome::Sent);
        assert_eq!(machine.submit("m"), SubmitOutcome::Duplicate);
    }

    #[test]
    fn test_retry_schedule_without_reset() {
        let mut machine = Machine::new(true, Backoff::default(), false);
        let mut delays = Vec::new();

        for _ in 0..6 {
            match machine.on_close() {
                CloseTransition::Retry { delay, .. } => delays.push(delay.as_secs()),
                CloseTransition::Final => panic!("should retry"),
            }
            assert_eq!(machine.state(), ChannelState::ClosedRetrying);
            assert!(machine.on_timer());
            assert_eq!(machine.state(), ChannelState::Connecting);
            // a successful open does not reset the counter
            machine.on_open();
        }

        assert_eq!(delays, vec![1, 3, 7, 15, 30, 30]);
        assert_eq!(machine.attempts(), 7);
    }

    #[test]
    fn test_retry_schedule_with_reset() {
        let mut machine = Machine::new(true, Backoff::default(), true);
        assert!(matches!(machine.on_close(), CloseTransition::Retry { .. }));
        assert!(machine.on_timer());
        assert!(matches!(
            machine.on_close(),
            CloseTransition::Retry { attempt: 2, .. }
        ));
        assert!(machine.on_timer());
        machine.on_open();
        assert_eq!(machine.attempts(), 1);
        assert_eq!(
            machine.on_close(),
            CloseTransition::Retry {
                delay: Duration::from_secs(1),
                attempt: 1
            }
        );
    }

    #[test]
    fn test_close_with_reconnect_disabled_is_final() {
        let mut machine = Machine::new(false, Backoff::default(), false);
        machine.on_open();
        assert_eq!(machine.on_close(), CloseTransition::Final);
        assert_eq!(machine.state(), ChannelState::ClosedFinal);
    }

    #[test]
    fn test_close_cancels_pending_retry() {
        let mut machine = open_machine();
        assert!(matches!(machine.on_close(), CloseTransition::Retry { .. }));
        assert!(machine.close());
        assert!(!machine.on_timer());
        assert_eq!(machine.state(), ChannelState::ClosedFinal);
        assert_eq!(machine.attempts(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut machine = open_machine();
        assert!(machine.close());
        assert!(!machine.close());
        assert_eq!(machine.on_open(), None);
        assert_eq!(machine.on_close(), CloseTransition::Final);
        assert_eq!(machine.submit("late"), SubmitOutcome::NotOpen);
    }

    #[test]
    fn test_generation_bumps_per_open() {
        let mut machine = open_machine();
        machine.on_close();
        machine.on_timer();
        assert_eq!(machine.on_open(), Some(2));
        assert_eq!(machine.generation(), 2);
    }

    proptest! {
        #[test]
        fn prop_repeated_submit_sends_once(payload in "[a-z]{1,16}", repeats in 1usize..20) {
            let mut machine = open_machine();
            let sent = (0..repeats)
                .filter(|_| machine.submit(&payload).is_sent())
                .count();
            prop_assert_eq!(sent, 1);
        }

        #[test]
        fn prop_distinct_payloads_both_send(a in "[a-z]{1,8}", b in "[A-Z]{1,8}") {
            let mut machine = open_machine();
            prop_assert!(machine.submit(&a).is_sent());
            prop_assert!(machine.submit(&b).is_sent());
        }
    }
}
