pub mod error;
pub mod routes;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::cache::DirectoryCache;

/// Shared state for all request handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: DirectoryCache,
}

impl AppState {
    pub fn new(cache_entries: usize, cache_ttl: Duration) -> Self {
        AppState {
            cache: DirectoryCache::new(cache_entries, cache_ttl),
        }
    }
}

/// Build the service router: a health probe plus the two archive operations
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/list-files", post(routes::list_files))
        .route("/download_files", post(routes::download_files))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
