//! Channel identity and manifest payload types
//!
//! This module defines the key type for identifying channels and the manifest
//! payloads that are delivered to holders.

use bytes::Bytes;

/// Unique identifier for a channel (one live stream's manifest feed)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a new channel id from a stream name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The underlying stream name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// One version of a channel's manifest
///
/// This is what holders receive and what stale clients are served directly.
/// Cheap to clone: the body is reference-counted via `Bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestUpdate {
    /// Version marker, strictly increasing per channel
    pub sequence: u64,
    /// Manifest payload (playlist text)
    pub body: Bytes,
}

impl ManifestUpdate {
    /// Create a new manifest update
    pub fn new(sequence: u64, body: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            body: body.into(),
        }
    }
}

/// An origin-submitted manifest update for one channel
///
/// The sequence is origin-assigned. The registry enforces monotonicity:
/// stale sequences are dropped as duplicates, jumps are accepted with a
/// warning (the origin is authoritative).
#[derive(Debug, Clone)]
pub struct PublishEvent {
    /// Target channel
    pub channel_id: ChannelId,
    /// Origin-assigned sequence for this version
    pub sequence: u64,
    /// Manifest payload
    pub body: Bytes,
}

impl PublishEvent {
    /// Create a new publish event
    pub fn new(channel_id: impl Into<ChannelId>, sequence: u64, body: impl Into<Bytes>) -> Self {
        Self {
            channel_id: channel_id.into(),
            sequence,
            body: body.into(),
        }
    }

    /// The manifest update this event carries
    pub fn update(&self) -> ManifestUpdate {
        ManifestUpdate {
            sequence: self.sequence,
            body: self.body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_display() {
        let id = ChannelId::new("live1");
        assert_eq!(id.to_string(), "live1");
        assert_eq!(id.as_str(), "live1");
    }

    #[test]
    fn test_publish_event_update() {
        let event = PublishEvent::new("live1", 6, "#EXTM3U...#6");
        let update = event.update();

        assert_eq!(update.sequence, 6);
        assert_eq!(update.body, Bytes::from_static(b"#EXTM3U...#6"));
    }
}
