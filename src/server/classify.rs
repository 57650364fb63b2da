//! Request classification
//!
//! Decides, from registry state alone, whether a manifest request can be
//! answered now or must be registered as a hold. Read-only: no side effects
//! beyond inspecting the registry.

use crate::registry::{ChannelId, ChannelRegistry, ManifestUpdate};

/// Decision for an incoming manifest request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The client is stale (or declared no sequence); serve this now
    Immediate(ManifestUpdate),
    /// Nothing new for this client; register a hold
    Hold,
}

/// Classify a manifest request against the channel's current state
///
/// A channel that does not exist or has published nothing yet always holds
/// (the first publish wakes the holder). A client ahead of the registry,
/// meaning its sequence survived a process restart, is served the current
/// state to resynchronize.
pub async fn classify(
    registry: &ChannelRegistry,
    channel_id: &ChannelId,
    client_sequence: Option<u64>,
) -> Classification {
    let Some(update) = registry.snapshot(channel_id).await else {
        return Classification::Hold;
    };

    match client_sequence {
        Some(sequence) if sequence == update.sequence => Classification::Hold,
        Some(sequence) if sequence > update.sequence => {
            tracing::debug!(
                channel = %channel_id,
                client_sequence = sequence,
                current_sequence = update.sequence,
                "Client ahead of registry; serving current state to resync"
            );
            Classification::Immediate(update)
        }
        _ => Classification::Immediate(update),
    }
}
