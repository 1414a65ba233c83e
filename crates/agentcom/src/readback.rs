//! HTTP read-back view of the cached snapshot

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::store::SnapshotStore;

/// Path serving the latest snapshot
pub const LAST_SNAPSHOT_PATH: &str = "/lastSnapshot";

/// Read-only HTTP surface over a [`SnapshotStore`]
#[derive(Clone)]
pub struct ReadBack {
    store: Arc<SnapshotStore>,
}

impl ReadBack {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route(LAST_SNAPSHOT_PATH, get(Self::handle_last_snapshot))
            .layer(TraceLayer::new_for_http())
            .with_state(self.store.clone())
    }

    async fn handle_last_snapshot(State(store): State<Arc<SnapshotStore>>) -> Response {
        let Some(stored) = store.read() else {
            return StatusCode::NOT_FOUND.into_response();
        };

        match serde_json::to_vec(&stored.snapshot) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Failed to encode snapshot: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
