//! Segment cache gateway
//!
//! Chunk bytes are served by an external cache layer, not by this crate.
//! The gateway trait is the seam: the front door delegates `/segment/{id}`
//! lookups to it and nothing more.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// External collaborator serving immutable chunk bytes by key
#[async_trait]
pub trait SegmentGateway: Send + Sync {
    /// Fetch the bytes for a chunk, or `None` if the chunk is unknown
    async fn fetch(&self, chunk_id: &str) -> Result<Option<Bytes>>;
}

/// Gateway with no segments; every lookup misses
#[derive(Debug, Default)]
pub struct NullSegmentGateway;

#[async_trait]
impl SegmentGateway for NullSegmentGateway {
    async fn fetch(&self, _chunk_id: &str) -> Result<Option<Bytes>> {
        Ok(None)
    }
}

/// In-memory gateway for demos and tests
#[derive(Debug, Default)]
pub struct StaticSegmentGateway {
    segments: RwLock<HashMap<String, Bytes>>,
}

impl StaticSegmentGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a chunk
    pub fn insert(&self, chunk_id: impl Into<String>, bytes: impl Into<Bytes>) {
        self.segments
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(chunk_id.into(), bytes.into());
    }
}

#[async_trait]
impl SegmentGateway for StaticSegmentGateway {
    async fn fetch(&self, chunk_id: &str) -> Result<Option<Bytes>> {
        Ok(self
            .segments
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(chunk_id)
            .cloned())
    }
}
