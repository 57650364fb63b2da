//! HTTP front door
//!
//! The thin request-routing layer in front of the core: manifest requests
//! are classified and either answered from registry state or parked as
//! holds; segment requests are delegated to the cache gateway. Only GET is
//! routed; unknown paths get a 404 and unexpected failures a generic 500
//! with the detail kept server-side.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::hold::{HoldManager, HoldReply};
use crate::registry::{ChannelId, ChannelRegistry, ManifestUpdate};

use super::classify::{classify, Classification};
use super::gateway::SegmentGateway;

/// Content type served for manifest bodies
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Content type served for segment bytes
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Response header carrying the manifest sequence
pub const SEQUENCE_HEADER: &str = "x-manifest-sequence";

/// Shared state behind the router
#[derive(Clone)]
pub struct AppState {
    /// Channel registry
    pub registry: Arc<ChannelRegistry>,
    /// Hold manager
    pub holds: Arc<HoldManager>,
    /// Segment cache gateway
    pub gateway: Arc<dyn SegmentGateway>,
}

#[derive(Debug, Deserialize)]
struct ManifestQuery {
    /// The sequence the client already has
    seq: Option<u64>,
}

/// Build the front-door router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/manifest/{channel_id}", get(fetch_manifest))
        .route("/segment/{chunk_id}", get(fetch_segment))
        .route("/healthz", get(health_check))
        .fallback(not_found)
        .with_state(state)
}

/// GET `/manifest/{channel_id}?seq={n}`
///
/// Answers immediately when the client is stale, otherwise parks the
/// request as a hold until the next publish or the hold ceiling.
async fn fetch_manifest(
    Path(channel_id): Path<String>,
    Query(query): Query<ManifestQuery>,
    State(state): State<AppState>,
) -> Response {
    let channel_id = ChannelId::new(channel_id);

    match classify(&state.registry, &channel_id, query.seq).await {
        Classification::Immediate(update) => manifest_response(&update),
        Classification::Hold => {
            let ticket = match state
                .holds
                .register(channel_id, query.seq.unwrap_or(0))
                .await
            {
                Ok(ticket) => ticket,
                Err(error) => return internal_error(&error),
            };

            match ticket.wait().await {
                HoldReply::Update(update) => manifest_response(&update),
                HoldReply::Reconnect { sequence } => reconnect_response(sequence),
            }
        }
    }
}

/// GET `/segment/{chunk_id}`, delegated entirely to the cache gateway
async fn fetch_segment(
    Path(chunk_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.gateway.fetch(&chunk_id).await {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE)],
            Body::from(bytes),
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
        Err(error) => internal_error(&error),
    }
}

/// GET `/healthz` liveness probe
async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// 200 with the manifest body and its sequence echoed in a header
fn manifest_response(update: &ManifestUpdate) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
            ),
            (
                header::HeaderName::from_static(SEQUENCE_HEADER),
                HeaderValue::from(update.sequence),
            ),
        ],
        Body::from(update.body.clone()),
    )
        .into_response()
}

/// 204 telling the client "no update yet, reconnect with the same sequence"
fn reconnect_response(sequence: u64) -> Response {
    (
        StatusCode::NO_CONTENT,
        [(
            header::HeaderName::from_static(SEQUENCE_HEADER),
            HeaderValue::from(sequence),
        )],
    )
        .into_response()
}

/// Generic 500; the detail stays in the server log
fn internal_error(error: &dyn std::fmt::Display) -> Response {
    tracing::error!(error = %error, "Request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
