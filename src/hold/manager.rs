//! Hold lifecycle management
//!
//! The manager owns the suspend/resume lifecycle of held connections:
//! registration (subscribe + timer), targeted delivery, timeout, and
//! disconnect cleanup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::registry::{ChannelId, ChannelRegistry, ManifestUpdate, RegistryError};

use super::connection::{HeldConnection, HoldReply, HoldState};

/// Outcome of a targeted delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The holder received the body and closed
    Delivered,
    /// The holder already has this sequence; left pending
    Skipped,
    /// The holder already reached a terminal state
    AlreadyClosed,
}

/// Lifecycle counters for hold activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldStats {
    /// Holds registered
    pub opened: u64,
    /// Holds resolved by delivery
    pub delivered: u64,
    /// Holds resolved by the hold ceiling
    pub timed_out: u64,
    /// Holds abandoned by the client
    pub disconnected: u64,
    /// Register attempts shed at the capacity ceiling
    pub shed: u64,
    /// Holds currently pending
    pub active: u64,
}

#[derive(Default)]
struct Counters {
    opened: AtomicU64,
    delivered: AtomicU64,
    timed_out: AtomicU64,
    disconnected: AtomicU64,
    shed: AtomicU64,
    active: AtomicU64,
}

/// Manages the lifecycle of held connections
pub struct HoldManager {
    registry: Arc<ChannelRegistry>,

    /// Fixed hold ceiling, kept below upstream idle timeouts so a hold ends
    /// with a clean close rather than an abrupt severance
    hold_timeout: Duration,

    /// Maximum concurrent holds (0 = unlimited)
    max_holds: usize,

    next_connection_id: AtomicU64,
    counters: Counters,
}

impl HoldManager {
    /// Create a new manager over the given registry
    pub fn new(registry: Arc<ChannelRegistry>, hold_timeout: Duration, max_holds: usize) -> Self {
        Self {
            registry,
            hold_timeout,
            max_holds,
            next_connection_id: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    /// The configured hold ceiling
    pub fn hold_timeout(&self) -> Duration {
        self.hold_timeout
    }

    /// Register a hold on a channel
    ///
    /// Subscribes via the registry (retrying once if the channel is reaped
    /// concurrently) and arms the timeout timer. The returned ticket resolves
    /// on delivery, timeout, or shutdown; dropping it releases the hold.
    pub async fn register(
        self: &Arc<Self>,
        channel_id: ChannelId,
        client_sequence: u64,
    ) -> Result<HoldTicket, RegistryError> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        if self.max_holds > 0
            && self.counters.active.load(Ordering::Relaxed) as usize >= self.max_holds
        {
            return Ok(self.shed(id, channel_id, client_sequence));
        }

        let mut entry = self.registry.get_or_create(&channel_id).await;

        // A client claiming a sequence from a previous process generation
        // must not wedge the delivery skip guard.
        let last_seen = client_sequence.min(entry.read().await.current_sequence());

        let (connection, reply) = HeldConnection::new(id, channel_id.clone(), last_seen);

        if let Err(RegistryError::ChannelGone(_)) = self
            .registry
            .subscribe(&channel_id, Arc::clone(&connection))
            .await
        {
            // Reaped between lookup and subscribe; recreate and retry once
            entry = self.registry.get_or_create(&channel_id).await;
            self.registry
                .subscribe(&channel_id, Arc::clone(&connection))
                .await?;
        }

        self.counters.opened.fetch_add(1, Ordering::Relaxed);
        self.counters.active.fetch_add(1, Ordering::Relaxed);

        let manager = Arc::clone(self);
        let timer_connection = Arc::clone(&connection);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(manager.hold_timeout).await;
            manager.expire(&timer_connection).await;
        });
        connection.set_timer(timer.abort_handle());

        tracing::debug!(
            channel = %connection.channel_id(),
            connection_id = id,
            last_seen,
            "Hold registered"
        );

        // A publish may have landed between classification and subscribe;
        // deliver the current state now rather than strand the holder until
        // the next publish.
        let missed = entry.read().await.update();
        if let Some(update) = missed {
            if update.sequence > last_seen {
                self.deliver(&connection, &update).await;
            }
        }

        Ok(HoldTicket {
            connection,
            reply,
            manager: Arc::clone(self),
        })
    }

    /// Answer a register attempt with the reconnect signal instead of holding
    ///
    /// At the capacity ceiling the client's retry loop degrades to plain
    /// polling, which keeps the long-poll contract intact.
    fn shed(self: &Arc<Self>, id: u64, channel_id: ChannelId, client_sequence: u64) -> HoldTicket {
        let (connection, reply) = HeldConnection::new(id, channel_id, client_sequence);

        if let Some(tx) = connection.try_finish(HoldState::TimedOut) {
            let _ = tx.send(HoldReply::Reconnect {
                sequence: client_sequence,
            });
        }

        self.counters.shed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            channel = %connection.channel_id(),
            connection_id = id,
            max_holds = self.max_holds,
            "Hold shed: capacity reached"
        );

        HoldTicket {
            connection,
            reply,
            manager: Arc::clone(self),
        }
    }

    /// Deliver a manifest update to exactly this connection
    ///
    /// Safe to call concurrently with the timeout timer; the first to
    /// transition out of `Pending` wins and the other is a no-op. An update
    /// the holder has already seen leaves it pending.
    pub async fn deliver(
        &self,
        connection: &Arc<HeldConnection>,
        update: &ManifestUpdate,
    ) -> Delivery {
        if update.sequence <= connection.last_seen_sequence() {
            return Delivery::Skipped;
        }

        let Some(reply) = connection.try_finish(HoldState::Delivered) else {
            return Delivery::AlreadyClosed;
        };

        connection.abort_timer();
        let _ = reply.send(HoldReply::Update(update.clone()));
        self.release(connection).await;
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            channel = %connection.channel_id(),
            connection_id = connection.id(),
            sequence = update.sequence,
            "Hold delivered"
        );

        Delivery::Delivered
    }

    /// Resolve a hold whose ceiling elapsed with nothing to deliver
    ///
    /// Also used to drain remaining holders on shutdown. A normal protocol
    /// state, not an error: the client reconnects with the same sequence.
    pub(crate) async fn expire(&self, connection: &Arc<HeldConnection>) {
        let Some(reply) = connection.try_finish(HoldState::TimedOut) else {
            return;
        };

        let _ = reply.send(HoldReply::Reconnect {
            sequence: connection.last_seen_sequence(),
        });
        self.release(connection).await;
        self.counters.timed_out.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            channel = %connection.channel_id(),
            connection_id = connection.id(),
            "Hold timed out"
        );
    }

    /// Clean up after a client that went away before any outcome
    ///
    /// The transport is gone; no reply is attempted.
    pub(crate) async fn on_disconnect(&self, connection: &Arc<HeldConnection>) {
        let Some(reply) = connection.try_finish(HoldState::Closed) else {
            return;
        };
        drop(reply);

        connection.abort_timer();
        self.release(connection).await;
        self.counters.disconnected.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            channel = %connection.channel_id(),
            connection_id = connection.id(),
            "Hold abandoned by client"
        );
    }

    /// Release the registry slot of a resolved hold
    async fn release(&self, connection: &Arc<HeldConnection>) {
        self.registry
            .unsubscribe(connection.channel_id(), connection.id())
            .await;
        self.counters.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Snapshot of the lifecycle counters
    pub fn stats(&self) -> HoldStats {
        HoldStats {
            opened: self.counters.opened.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            disconnected: self.counters.disconnected.load(Ordering::Relaxed),
            shed: self.counters.shed.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::Relaxed),
        }
    }
}

/// A registered hold; await [`HoldTicket::wait`] for the outcome
///
/// Dropping the ticket before an outcome (the client disconnected) releases
/// the registry slot and timer with no reply attempted.
pub struct HoldTicket {
    connection: Arc<HeldConnection>,
    reply: oneshot::Receiver<HoldReply>,
    manager: Arc<HoldManager>,
}

impl HoldTicket {
    /// The underlying held connection
    pub fn connection(&self) -> &Arc<HeldConnection> {
        &self.connection
    }

    /// Suspend until delivery, timeout, or shutdown resolves this hold
    pub async fn wait(mut self) -> HoldReply {
        match (&mut self.reply).await {
            Ok(reply) => reply,
            // Sender dropped without a reply; treat as a timeout
            Err(_) => HoldReply::Reconnect {
                sequence: self.connection.last_seen_sequence(),
            },
        }
    }
}

impl Drop for HoldTicket {
    fn drop(&mut self) {
        if self.connection.state() != HoldState::Pending {
            return;
        }

        // Client disconnect: the handler future was dropped mid-hold. The
        // cleanup is async, so hand it to the runtime if one is still up.
        let manager = Arc::clone(&self.manager);
        let connection = Arc::clone(&self.connection);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                manager.on_disconnect(&connection).await;
            });
        }
    }
}
