//! Registry error types

use thiserror::Error;

use super::manifest::ChannelId;

/// Error type for registry operations
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Channel was reclaimed between lookup and subscribe; retry `get_or_create`
    #[error("channel gone: {0}")]
    ChannelGone(ChannelId),
}
