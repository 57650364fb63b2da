//! Per-channel state
//!
//! This module defines the state stored in the registry for one live channel:
//! the latest accepted manifest version and the set of current holders.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::time::Instant;

use crate::hold::HeldConnection;

use super::manifest::ManifestUpdate;

/// State for a single channel in the registry
///
/// A channel is created lazily on first subscribe or first publish. A
/// sequence of 0 means nothing has been published yet.
pub struct Channel {
    /// Last accepted manifest version; never decreases
    pub(super) current_sequence: u64,

    /// Most recent manifest payload
    pub(super) current_body: Bytes,

    /// Current holders, keyed by connection id
    pub(super) subscribers: HashMap<u64, Arc<HeldConnection>>,

    /// When the channel was created
    pub(super) created_at: Instant,

    /// Last subscribe or accepted publish (for idle reclaim)
    pub(super) last_activity: Instant,
}

impl Channel {
    pub(super) fn new() -> Self {
        let now = Instant::now();
        Self {
            current_sequence: 0,
            current_body: Bytes::new(),
            subscribers: HashMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Last accepted sequence (0 = nothing published yet)
    pub fn current_sequence(&self) -> u64 {
        self.current_sequence
    }

    /// Number of current holders
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// The latest manifest update, or `None` until the first publish
    pub fn update(&self) -> Option<ManifestUpdate> {
        if self.current_sequence == 0 {
            return None;
        }
        Some(ManifestUpdate {
            sequence: self.current_sequence,
            body: self.current_body.clone(),
        })
    }

    /// Record activity, deferring idle reclaim
    pub(super) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Immutable snapshot of the current holders
    pub(super) fn snapshot_subscribers(&self) -> Vec<Arc<HeldConnection>> {
        self.subscribers.values().map(Arc::clone).collect()
    }

    /// Whether the channel has been idle (no holders, no activity) past `grace`
    pub(super) fn is_reapable(&self, now: Instant, grace: std::time::Duration) -> bool {
        self.subscribers.is_empty() && now.duration_since(self.last_activity) > grace
    }

    /// Point-in-time statistics for this channel
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            current_sequence: self.current_sequence,
            subscriber_count: self.subscribers.len(),
            age: self.created_at.elapsed(),
        }
    }
}

/// Statistics for a channel
#[derive(Debug, Clone)]
pub struct ChannelStats {
    /// Last accepted sequence
    pub current_sequence: u64,
    /// Number of current holders
    pub subscriber_count: usize,
    /// Time since the channel was created
    pub age: std::time::Duration,
}
