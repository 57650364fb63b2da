//! Publish coordination
//!
//! Accepts publish events from the origin, applies them to the registry, and
//! dispatches fanout to the holders captured in the acceptance snapshot.

use std::sync::Arc;

use crate::hold::HoldManager;
use crate::registry::{ChannelRegistry, PublishEvent, PublishOutcome};

/// Result returned to the origin caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishResult {
    /// Event accepted; fanout has been dispatched
    Accepted {
        /// The accepted sequence
        sequence: u64,
        /// Holders in the acceptance snapshot
        subscribers: usize,
    },
    /// Sequence not newer than the channel's current one; dropped, not fatal
    Duplicate {
        /// The channel's current sequence
        current_sequence: u64,
    },
}

/// Accepts origin publishes and fans them out to current holders
#[derive(Clone)]
pub struct PublishCoordinator {
    registry: Arc<ChannelRegistry>,
    holds: Arc<HoldManager>,
}

impl PublishCoordinator {
    /// Create a new coordinator over the given registry and hold manager
    pub fn new(registry: Arc<ChannelRegistry>, holds: Arc<HoldManager>) -> Self {
        Self { registry, holds }
    }

    /// Apply a publish event and dispatch fanout
    ///
    /// Sequencing is origin-assigned: the event carries its sequence and the
    /// registry enforces monotonicity. Fanout runs in a spawned task so a
    /// slow or stalled delivery never delays the acknowledgment to the
    /// origin; the result is returned once fanout is dispatched.
    pub async fn publish(&self, event: PublishEvent) -> PublishResult {
        let channel_id = event.channel_id.clone();
        let update = event.update();

        match self.registry.apply_publish(event).await {
            PublishOutcome::Accepted {
                sequence,
                subscribers,
            } => {
                let count = subscribers.len();
                tracing::info!(
                    channel = %channel_id,
                    sequence,
                    subscribers = count,
                    "Publish accepted"
                );

                if count > 0 {
                    let holds = Arc::clone(&self.holds);
                    tokio::spawn(async move {
                        for connection in &subscribers {
                            holds.deliver(connection, &update).await;
                        }
                    });
                }

                PublishResult::Accepted {
                    sequence,
                    subscribers: count,
                }
            }
            PublishOutcome::Duplicate { current_sequence } => {
                tracing::debug!(
                    channel = %channel_id,
                    sequence = update.sequence,
                    current_sequence,
                    "Stale or duplicate publish dropped"
                );

                PublishResult::Duplicate { current_sequence }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hold::{HoldReply, HoldState};
    use crate::registry::ChannelId;

    fn setup() -> (Arc<ChannelRegistry>, Arc<HoldManager>, PublishCoordinator) {
        let registry = Arc::new(ChannelRegistry::new());
        let holds = Arc::new(HoldManager::new(
            Arc::clone(&registry),
            Duration::from_secs(20),
            0,
        ));
        let coordinator = PublishCoordinator::new(Arc::clone(&registry), Arc::clone(&holds));
        (registry, holds, coordinator)
    }

    #[tokio::test]
    async fn test_fanout_to_all_holders() {
        let (registry, holds, coordinator) = setup();
        let id = ChannelId::new("live1");

        // Channel already at sequence 5
        coordinator
            .publish(PublishEvent::new("live1", 5, "#EXTM3U...#5"))
            .await;

        // Three holders, all current at 5
        let mut tickets = Vec::new();
        for _ in 0..3 {
            tickets.push(holds.register(id.clone(), 5).await.unwrap());
        }

        let result = coordinator
            .publish(PublishEvent::new("live1", 6, "#EXTM3U...#6"))
            .await;
        assert_eq!(
            result,
            PublishResult::Accepted {
                sequence: 6,
                subscribers: 3
            }
        );

        // All three receive the new body exactly once and close
        for ticket in tickets {
            let connection = Arc::clone(ticket.connection());
            match ticket.wait().await {
                HoldReply::Update(update) => {
                    assert_eq!(update.sequence, 6);
                    assert_eq!(update.body, "#EXTM3U...#6");
                }
                other => panic!("unexpected reply: {:?}", other),
            }
            assert_eq!(connection.state(), HoldState::Delivered);
        }

        let stats = registry.channel_stats(&id).await.unwrap();
        assert_eq!(stats.current_sequence, 6);
        assert_eq!(stats.subscriber_count, 0);
        assert_eq!(holds.stats().delivered, 3);
    }

    #[tokio::test]
    async fn test_replay_is_duplicate_without_refanout() {
        let (_registry, holds, coordinator) = setup();

        let result = coordinator
            .publish(PublishEvent::new("live1", 1, "v1"))
            .await;
        assert_eq!(
            result,
            PublishResult::Accepted {
                sequence: 1,
                subscribers: 0
            }
        );

        // A holder current at 1
        let ticket = holds
            .register(ChannelId::new("live1"), 1)
            .await
            .unwrap();
        let connection = Arc::clone(ticket.connection());

        // Replaying the same event is dropped and wakes nobody
        let result = coordinator
            .publish(PublishEvent::new("live1", 1, "v1"))
            .await;
        assert_eq!(result, PublishResult::Duplicate { current_sequence: 1 });

        tokio::task::yield_now().await;
        assert_eq!(connection.state(), HoldState::Pending);

        // The next real sequence still gets through
        coordinator
            .publish(PublishEvent::new("live1", 2, "v2"))
            .await;
        match ticket.wait().await {
            HoldReply::Update(update) => assert_eq!(update.sequence, 2),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gap_accepted() {
        let (registry, _holds, coordinator) = setup();

        coordinator
            .publish(PublishEvent::new("live1", 1, "v1"))
            .await;

        // Origin resynchronized past a gap; delivery must not stall
        let result = coordinator
            .publish(PublishEvent::new("live1", 7, "v7"))
            .await;
        assert_eq!(
            result,
            PublishResult::Accepted {
                sequence: 7,
                subscribers: 0
            }
        );

        let stats = registry
            .channel_stats(&ChannelId::new("live1"))
            .await
            .unwrap();
        assert_eq!(stats.current_sequence, 7);
    }

    #[tokio::test]
    async fn test_accepted_sequences_strictly_increase() {
        let (registry, _holds, coordinator) = setup();

        let sequences = [1u64, 2, 2, 1, 4, 3, 5];
        let mut accepted = Vec::new();

        for sequence in sequences {
            if let PublishResult::Accepted { sequence, .. } = coordinator
                .publish(PublishEvent::new("live1", sequence, "body"))
                .await
            {
                accepted.push(sequence);
            }
        }

        assert_eq!(accepted, vec![1, 2, 4, 5]);
        let stats = registry
            .channel_stats(&ChannelId::new("live1"))
            .await
            .unwrap();
        assert_eq!(stats.current_sequence, 5);
    }
}
