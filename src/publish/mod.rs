//! Publish path
//!
//! The coordinator is the origin-facing entry point: it validates sequencing
//! through the registry and dispatches fanout to the holders present at the
//! instant of acceptance. Fanout across holders is independent and
//! order-insensitive; the origin is acknowledged as soon as fanout is
//! dispatched, never blocked on individual connections.

pub mod coordinator;

pub use coordinator::{PublishCoordinator, PublishResult};
