//! Channel registry for hold/publish routing
//!
//! The registry owns the set of live channels. Each channel carries the last
//! accepted manifest version and the set of connections currently holding for
//! the next one.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<ChannelRegistry>
//!                    ┌──────────────────────────┐
//!                    │ channels: HashMap<Id,    │
//!                    │   Channel {              │
//!                    │     current_sequence,    │
//!                    │     current_body,        │
//!                    │     subscribers,         │
//!                    │   }                      │
//!                    │ >                        │
//!                    └────────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Origin]                [Holder]                 [Holder]
//!    apply_publish()         ticket.wait()            ticket.wait()
//!         │                       ▲                       ▲
//!         └──► snapshot ──► HoldManager::deliver ─────────┘
//! ```
//!
//! Sequencing is validated under the per-channel lock; the subscriber
//! snapshot returned by `apply_publish` lets fanout run with no lock held.
//! Manifest bodies are `bytes::Bytes`, so every holder shares one allocation.

pub mod channel;
pub mod config;
pub mod error;
pub mod manifest;
pub mod store;

pub use channel::{Channel, ChannelStats};
pub use config::RegistryConfig;
pub use error::RegistryError;
pub use manifest::{ChannelId, ManifestUpdate, PublishEvent};
pub use store::{ChannelRegistry, PublishOutcome};
