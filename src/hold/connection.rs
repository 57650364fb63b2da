//! Held connection state
//!
//! One client's open hold on a channel. Delivery, timeout, and disconnect
//! race to resolve the hold; the race is decided by a single atomic
//! compare-and-swap out of `Pending`, so exactly one terminal path runs.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::registry::{ChannelId, ManifestUpdate};

/// Lifecycle state of a held connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HoldState {
    /// Waiting for a publish, the hold ceiling, or a disconnect
    Pending = 0,
    /// A manifest body was delivered
    Delivered = 1,
    /// The hold ceiling elapsed with nothing to deliver
    TimedOut = 2,
    /// The client went away before any outcome
    Closed = 3,
}

impl HoldState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => HoldState::Pending,
            1 => HoldState::Delivered,
            2 => HoldState::TimedOut,
            _ => HoldState::Closed,
        }
    }

    /// Whether this state ends the hold
    pub fn is_terminal(self) -> bool {
        self != HoldState::Pending
    }
}

/// Response pushed to a holder when its hold resolves
#[derive(Debug)]
pub enum HoldReply {
    /// A new manifest version
    Update(ManifestUpdate),
    /// Nothing new; reconnect with the same sequence
    Reconnect {
        /// The sequence the client should re-request with
        sequence: u64,
    },
}

/// One client's open hold on a channel
///
/// Created per request, destroyed on delivery, timeout, or disconnect;
/// never reused. While pending it consumes no compute, only a registry slot
/// and a timer.
#[derive(Debug)]
pub struct HeldConnection {
    /// Unique per hold attempt
    id: u64,

    /// The channel this hold is subscribed to; never mutated
    channel_id: ChannelId,

    /// When the hold was registered
    opened_at: Instant,

    /// The sequence the client already has
    last_seen_sequence: u64,

    /// Current state; transitions out of `Pending` exactly once
    state: AtomicU8,

    /// Reply slot, consumed by the winning transition
    reply: Mutex<Option<oneshot::Sender<HoldReply>>>,

    /// Timeout timer handle
    timer: Mutex<Option<AbortHandle>>,
}

impl HeldConnection {
    /// Create a pending connection and the receiver its reply arrives on
    pub(crate) fn new(
        id: u64,
        channel_id: ChannelId,
        last_seen_sequence: u64,
    ) -> (Arc<Self>, oneshot::Receiver<HoldReply>) {
        let (tx, rx) = oneshot::channel();

        let connection = Arc::new(Self {
            id,
            channel_id,
            opened_at: Instant::now(),
            last_seen_sequence,
            state: AtomicU8::new(HoldState::Pending as u8),
            reply: Mutex::new(Some(tx)),
            timer: Mutex::new(None),
        });

        (connection, rx)
    }

    /// Unique connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The channel this hold is subscribed to
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// When the hold was registered
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// The sequence the client already has
    pub fn last_seen_sequence(&self) -> u64 {
        self.last_seen_sequence
    }

    /// Current lifecycle state
    pub fn state(&self) -> HoldState {
        HoldState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Attach the timeout timer's abort handle
    pub(crate) fn set_timer(&self, handle: AbortHandle) {
        *self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Abort the timeout timer, if still armed
    ///
    /// Not called from the timer's own path: a task must not abort itself
    /// mid-cleanup.
    pub(crate) fn abort_timer(&self) {
        if let Some(timer) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.abort();
        }
    }

    /// Attempt the exclusive transition out of `Pending`
    ///
    /// Returns the reply sender if this caller won the race; `None` if a
    /// competing transition already resolved the hold (the caller must then
    /// do nothing).
    pub(crate) fn try_finish(&self, to: HoldState) -> Option<oneshot::Sender<HoldReply>> {
        debug_assert!(to.is_terminal());

        self.state
            .compare_exchange(
                HoldState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;

        self.reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_transition_wins() {
        let (connection, _rx) = HeldConnection::new(1, ChannelId::new("live1"), 5);
        assert_eq!(connection.state(), HoldState::Pending);

        let winner = connection.try_finish(HoldState::Delivered);
        assert!(winner.is_some());
        assert_eq!(connection.state(), HoldState::Delivered);

        // The racing timeout loses and becomes a no-op
        let loser = connection.try_finish(HoldState::TimedOut);
        assert!(loser.is_none());
        assert_eq!(connection.state(), HoldState::Delivered);
    }

    #[test]
    fn test_reply_only_after_winning_transition() {
        let (connection, rx) = HeldConnection::new(1, ChannelId::new("live1"), 0);
        let mut rx = tokio_test::task::spawn(rx);

        // Nothing arrives while the hold is still pending
        tokio_test::assert_pending!(rx.poll());

        let reply = connection.try_finish(HoldState::Delivered).unwrap();
        reply
            .send(HoldReply::Update(ManifestUpdate::new(1, "#EXTM3U")))
            .unwrap();

        match tokio_test::assert_ready_ok!(rx.poll()) {
            HoldReply::Update(update) => assert_eq!(update.sequence, 1),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!HoldState::Pending.is_terminal());
        assert!(HoldState::Delivered.is_terminal());
        assert!(HoldState::TimedOut.is_terminal());
        assert!(HoldState::Closed.is_terminal());
    }
}
