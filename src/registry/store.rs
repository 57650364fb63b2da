//! Channel registry implementation
//!
//! The central registry that owns all live channels and validates publish
//! sequencing before fanout.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::hold::HeldConnection;

use super::channel::{Channel, ChannelStats};
use super::config::RegistryConfig;
use super::error::RegistryError;
use super::manifest::{ChannelId, ManifestUpdate, PublishEvent};

/// Result of applying a publish event to a channel
#[derive(Debug)]
pub enum PublishOutcome {
    /// Event accepted; carries the holder snapshot taken at acceptance
    Accepted {
        /// The accepted sequence
        sequence: u64,
        /// Holders present at the instant of acceptance
        subscribers: Vec<Arc<HeldConnection>>,
    },
    /// Sequence not newer than the channel's current one; dropped
    Duplicate {
        /// The channel's current sequence
        current_sequence: u64,
    },
}

/// Central registry for all live channels
///
/// Thread-safe via `RwLock`. Mutation is serialized per channel by the
/// per-entry lock; distinct channels never contend.
pub struct ChannelRegistry {
    /// Map of channel id to channel state
    channels: RwLock<HashMap<ChannelId, Arc<RwLock<Channel>>>>,

    /// Configuration
    config: RegistryConfig,
}

impl ChannelRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Return the channel for `id`, creating it lazily if absent
    ///
    /// New channels start at sequence 0 with an empty body and no holders.
    pub async fn get_or_create(&self, id: &ChannelId) -> Arc<RwLock<Channel>> {
        {
            let channels = self.channels.read().await;
            if let Some(entry) = channels.get(id) {
                return Arc::clone(entry);
            }
        }

        let mut channels = self.channels.write().await;
        Arc::clone(channels.entry(id.clone()).or_insert_with(|| {
            tracing::info!(channel = %id, "Channel created");
            Arc::new(RwLock::new(Channel::new()))
        }))
    }

    /// Add a holder to a channel's subscriber set
    ///
    /// Fails with `ChannelGone` if the channel was concurrently reclaimed;
    /// the caller retries `get_or_create`.
    pub async fn subscribe(
        &self,
        id: &ChannelId,
        connection: Arc<HeldConnection>,
    ) -> Result<(), RegistryError> {
        let channels = self.channels.read().await;

        let entry = channels
            .get(id)
            .ok_or_else(|| RegistryError::ChannelGone(id.clone()))?;

        let mut channel = entry.write().await;
        channel.touch();
        channel.subscribers.insert(connection.id(), connection);

        tracing::debug!(
            channel = %id,
            subscribers = channel.subscriber_count(),
            "Subscriber added"
        );

        Ok(())
    }

    /// Remove a holder from a channel's subscriber set
    ///
    /// Idempotent: a no-op if the holder or the channel is already gone.
    pub async fn unsubscribe(&self, id: &ChannelId, connection_id: u64) {
        let channels = self.channels.read().await;

        if let Some(entry) = channels.get(id) {
            let mut channel = entry.write().await;
            if channel.subscribers.remove(&connection_id).is_some() {
                tracing::debug!(
                    channel = %id,
                    connection_id,
                    subscribers = channel.subscriber_count(),
                    "Subscriber removed"
                );
            }
        }
    }

    /// Validate and apply a publish event
    ///
    /// Atomically (under the channel's lock) checks sequencing, updates the
    /// channel state on acceptance, and snapshots the subscriber set. Holders
    /// subscribing during fanout are not in the snapshot; they catch the next
    /// publish. The snapshot keeps no lock held across the delivery phase.
    pub async fn apply_publish(&self, event: PublishEvent) -> PublishOutcome {
        let entry = self.get_or_create(&event.channel_id).await;
        let mut channel = entry.write().await;

        let current = channel.current_sequence;
        if event.sequence <= current {
            return PublishOutcome::Duplicate {
                current_sequence: current,
            };
        }

        if event.sequence > current + 1 {
            // Origin is authoritative; a gap must not stall live delivery.
            tracing::warn!(
                channel = %event.channel_id,
                expected = current + 1,
                actual = event.sequence,
                "Sequence jump accepted"
            );
        }

        channel.current_sequence = event.sequence;
        channel.current_body = event.body;
        channel.touch();

        PublishOutcome::Accepted {
            sequence: event.sequence,
            subscribers: channel.snapshot_subscribers(),
        }
    }

    /// Read-only view of a channel's latest manifest
    ///
    /// `None` if the channel does not exist or has published nothing yet.
    pub async fn snapshot(&self, id: &ChannelId) -> Option<ManifestUpdate> {
        let channels = self.channels.read().await;
        let entry = channels.get(id)?;
        let channel = entry.read().await;
        channel.update()
    }

    /// Get statistics for a channel
    pub async fn channel_stats(&self, id: &ChannelId) -> Option<ChannelStats> {
        let channels = self.channels.read().await;
        let entry = channels.get(id)?;
        let channel = entry.read().await;
        Some(channel.stats())
    }

    /// Get total number of channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Run one reap pass
    ///
    /// Removes channels with no holders and no activity for the grace window.
    /// Safe to run concurrently with all other operations.
    pub async fn reap(&self) {
        let mut channels = self.channels.write().await;
        let now = Instant::now();

        let reapable: Vec<ChannelId> = channels
            .iter()
            .filter_map(|(id, entry)| {
                // Skip entries currently locked by a subscribe or publish
                let channel = entry.try_read().ok()?;
                channel
                    .is_reapable(now, self.config.idle_grace_period)
                    .then(|| id.clone())
            })
            .collect();

        for id in reapable {
            channels.remove(&id);
            tracing::info!(channel = %id, "Idle channel reaped");
        }
    }

    /// Spawn the background reap task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_reap_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.reap_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.reap().await;
            }
        })
    }

    /// Empty the registry, returning every remaining holder
    ///
    /// Shutdown teardown: the server notifies the returned holders to
    /// reconnect before the process exits.
    pub async fn drain(&self) -> Vec<Arc<HeldConnection>> {
        let mut channels = self.channels.write().await;
        let mut holders = Vec::new();

        for (_, entry) in channels.drain() {
            let mut channel = entry.write().await;
            holders.extend(channel.subscribers.drain().map(|(_, conn)| conn));
        }

        holders
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64, channel: &str, last_seen: u64) -> Arc<HeldConnection> {
        HeldConnection::new(id, ChannelId::new(channel), last_seen).0
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("live1");

        assert_eq!(registry.channel_count().await, 0);
        assert!(registry.snapshot(&id).await.is_none());

        let entry = registry.get_or_create(&id).await;
        assert_eq!(registry.channel_count().await, 1);

        let channel = entry.read().await;
        assert_eq!(channel.current_sequence(), 0);
        assert_eq!(channel.subscriber_count(), 0);
        // Nothing published yet
        assert!(channel.update().is_none());
    }

    #[tokio::test]
    async fn test_apply_publish_sequencing() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("live1");

        // First publish creates the channel
        let outcome = registry.apply_publish(PublishEvent::new("live1", 1, "v1")).await;
        assert!(matches!(outcome, PublishOutcome::Accepted { sequence: 1, .. }));

        // Strict successor accepted
        let outcome = registry.apply_publish(PublishEvent::new("live1", 2, "v2")).await;
        assert!(matches!(outcome, PublishOutcome::Accepted { sequence: 2, .. }));

        // Replay is an idempotent duplicate
        let outcome = registry.apply_publish(PublishEvent::new("live1", 2, "v2")).await;
        assert!(matches!(
            outcome,
            PublishOutcome::Duplicate { current_sequence: 2 }
        ));

        // A gap is accepted as a jump
        let outcome = registry.apply_publish(PublishEvent::new("live1", 5, "v5")).await;
        assert!(matches!(outcome, PublishOutcome::Accepted { sequence: 5, .. }));

        // Older data after the jump is dropped
        let outcome = registry.apply_publish(PublishEvent::new("live1", 3, "v3")).await;
        assert!(matches!(
            outcome,
            PublishOutcome::Duplicate { current_sequence: 5 }
        ));

        let update = registry.snapshot(&id).await.unwrap();
        assert_eq!(update.sequence, 5);
        assert_eq!(update.body, "v5");
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe_idempotent() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("live1");

        registry.get_or_create(&id).await;
        registry.subscribe(&id, conn(1, "live1", 0)).await.unwrap();

        let stats = registry.channel_stats(&id).await.unwrap();
        assert_eq!(stats.subscriber_count, 1);

        registry.unsubscribe(&id, 1).await;
        // Second removal is a no-op
        registry.unsubscribe(&id, 1).await;

        let stats = registry.channel_stats(&id).await.unwrap();
        assert_eq!(stats.subscriber_count, 0);
    }

    #[tokio::test]
    async fn test_subscribe_channel_gone() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("live1");

        let result = registry.subscribe(&id, conn(1, "live1", 0)).await;
        assert!(matches!(result, Err(RegistryError::ChannelGone(_))));
    }

    #[tokio::test]
    async fn test_publish_snapshot_excludes_later_subscribers() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("live1");

        registry.get_or_create(&id).await;
        registry.subscribe(&id, conn(1, "live1", 0)).await.unwrap();
        registry.subscribe(&id, conn(2, "live1", 0)).await.unwrap();

        let outcome = registry.apply_publish(PublishEvent::new("live1", 1, "v1")).await;
        let subscribers = match outcome {
            PublishOutcome::Accepted { subscribers, .. } => subscribers,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(subscribers.len(), 2);

        // A holder arriving after acceptance is not in that snapshot
        registry.subscribe(&id, conn(3, "live1", 1)).await.unwrap();
        assert_eq!(subscribers.len(), 2);
        let stats = registry.channel_stats(&id).await.unwrap();
        assert_eq!(stats.subscriber_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_idle_channel() {
        let config = RegistryConfig::default()
            .idle_grace_period(std::time::Duration::from_millis(100));
        let registry = ChannelRegistry::with_config(config);
        let id = ChannelId::new("live1");

        registry.get_or_create(&id).await;

        // Still inside the grace window
        registry.reap().await;
        assert_eq!(registry.channel_count().await, 1);

        tokio::time::advance(std::time::Duration::from_millis(150)).await;
        registry.reap().await;
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_spares_channel_with_holders() {
        let config = RegistryConfig::default()
            .idle_grace_period(std::time::Duration::from_millis(100));
        let registry = ChannelRegistry::with_config(config);
        let id = ChannelId::new("live1");

        registry.get_or_create(&id).await;
        registry.subscribe(&id, conn(1, "live1", 0)).await.unwrap();

        tokio::time::advance(std::time::Duration::from_millis(150)).await;
        registry.reap().await;
        assert_eq!(registry.channel_count().await, 1);
    }

    #[tokio::test]
    async fn test_drain() {
        let registry = ChannelRegistry::new();
        let id = ChannelId::new("live1");

        registry.get_or_create(&id).await;
        registry.subscribe(&id, conn(1, "live1", 0)).await.unwrap();
        registry.subscribe(&id, conn(2, "live1", 0)).await.unwrap();

        let holders = registry.drain().await;
        assert_eq!(holders.len(), 2);
        assert_eq!(registry.channel_count().await, 0);
    }
}
