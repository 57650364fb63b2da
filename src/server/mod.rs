//! Manifest distribution server
//!
//! Wires the core components together behind the HTTP front door and owns
//! the run loop: bind, serve, background reap, and shutdown teardown.

pub mod classify;
pub mod config;
pub mod gateway;
pub mod router;

pub use classify::{classify, Classification};
pub use config::ServerConfig;
pub use gateway::{NullSegmentGateway, SegmentGateway, StaticSegmentGateway};
pub use router::{AppState, MANIFEST_CONTENT_TYPE, SEGMENT_CONTENT_TYPE, SEQUENCE_HEADER};

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use crate::error::Result;
use crate::hold::HoldManager;
use crate::publish::PublishCoordinator;
use crate::registry::ChannelRegistry;

/// Live manifest distribution server
///
/// Holds manifest requests open at the edge and pushes new bodies to all
/// waiting clients the instant the origin publishes. All state is in-memory:
/// a restart drops holds and channels, and clients resynchronize via their
/// last-known sequence.
pub struct ManifestServer {
    config: ServerConfig,
    registry: Arc<ChannelRegistry>,
    holds: Arc<HoldManager>,
    coordinator: PublishCoordinator,
    gateway: Arc<dyn SegmentGateway>,
}

impl ManifestServer {
    /// Create a new server with the given configuration and segment gateway
    pub fn new(config: ServerConfig, gateway: Arc<dyn SegmentGateway>) -> Self {
        let registry = Arc::new(ChannelRegistry::with_config(config.registry.clone()));
        let holds = Arc::new(HoldManager::new(
            Arc::clone(&registry),
            config.hold_timeout,
            config.max_holds,
        ));
        let coordinator = PublishCoordinator::new(Arc::clone(&registry), Arc::clone(&holds));

        Self {
            config,
            registry,
            holds,
            coordinator,
            gateway,
        }
    }

    /// Get a reference to the channel registry
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Get a reference to the hold manager
    pub fn holds(&self) -> &Arc<HoldManager> {
        &self.holds
    }

    /// The origin-facing publish entry point
    pub fn coordinator(&self) -> &PublishCoordinator {
        &self.coordinator
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Build the front-door router over this server's state
    pub fn router(&self) -> Router {
        router::create_router(AppState {
            registry: Arc::clone(&self.registry),
            holds: Arc::clone(&self.holds),
            gateway: Arc::clone(&self.gateway),
        })
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Manifest server listening");

        let _reap_handle = self.registry.spawn_reap_task();

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Run the server with graceful shutdown
    ///
    /// On shutdown, remaining holders are notified to reconnect before the
    /// method returns.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Manifest server listening");

        let reap_handle = self.registry.spawn_reap_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = axum::serve(listener, self.router()).into_future() => result.map_err(Into::into),
        };

        reap_handle.abort();
        self.drain_holders().await;

        result
    }

    /// Notify every remaining holder to reconnect
    async fn drain_holders(&self) {
        let holders = self.registry.drain().await;
        if holders.is_empty() {
            return;
        }

        tracing::info!(holders = holders.len(), "Draining remaining holders");
        for connection in &holders {
            self.holds.expire(connection).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hold::{HoldReply, HoldState};
    use crate::registry::ChannelId;

    #[tokio::test]
    async fn test_drain_notifies_holders() {
        let server = ManifestServer::new(ServerConfig::default(), Arc::new(NullSegmentGateway));

        let ticket = server
            .holds()
            .register(ChannelId::new("live1"), 0)
            .await
            .unwrap();
        let connection = Arc::clone(ticket.connection());

        server.drain_holders().await;

        match ticket.wait().await {
            HoldReply::Reconnect { sequence } => assert_eq!(sequence, 0),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(connection.state(), HoldState::TimedOut);
        assert_eq!(server.registry().channel_count().await, 0);
    }
}
