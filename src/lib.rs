//! Low-latency live manifest distribution
//!
//! Clients fetch an ever-updating playlist describing available media
//! chunks. Instead of polling, a request that is already current is held
//! open at the edge; the moment the origin publishes a new chunk, the new
//! manifest body is pushed to every waiting client and the requests close.
//!
//! The crate is organized around three components:
//!
//! - [`registry`]: the channel registry, holding per-stream manifest state
//!   and subscriber sets, with publish sequencing validated under a
//!   per-channel lock.
//! - [`hold`]: the hold manager, owning the lifecycle of one held
//!   connection; the delivery/timeout race is decided by a single atomic
//!   state transition.
//! - [`publish`]: the publish coordinator, the origin-facing entry point
//!   that applies events and dispatches fanout without blocking on slow
//!   holders.
//!
//! [`server`] wires these behind a thin HTTP front door; segment bytes are
//! delegated to an external cache via [`server::SegmentGateway`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fanout_rs::registry::PublishEvent;
//! use fanout_rs::server::{ManifestServer, NullSegmentGateway, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> fanout_rs::Result<()> {
//!     let server = ManifestServer::new(ServerConfig::default(), Arc::new(NullSegmentGateway));
//!
//!     // Origin side: push a new manifest version to all current holders.
//!     let coordinator = server.coordinator().clone();
//!     tokio::spawn(async move {
//!         coordinator
//!             .publish(PublishEvent::new("live1", 1, "#EXTM3U\n#EXT-X-MEDIA-SEQUENCE:1\n"))
//!             .await;
//!     });
//!
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod hold;
pub mod publish;
pub mod registry;
pub mod server;

pub use error::{Error, Result};
pub use hold::{Delivery, HoldManager, HoldReply, HoldState, HoldStats, HoldTicket};
pub use publish::{PublishCoordinator, PublishResult};
pub use registry::{
    ChannelId, ChannelRegistry, ChannelStats, ManifestUpdate, PublishEvent, PublishOutcome,
    RegistryConfig, RegistryError,
};
pub use server::{ManifestServer, SegmentGateway, ServerConfig};
