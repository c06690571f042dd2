//! mqwatch server library logic.

pub mod api;
pub mod api_admin;
pub mod api_publish;
pub mod api_query;
pub mod config;
pub mod ingest;
pub mod render;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use config::Config;
use ingest::Ingestor;
use mqwatch_store::StoreHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Handle to the event store task.
    pub store: StoreHandle,
    /// Ingestion adapter feeding the store.
    pub ingestor: Ingestor,
    /// Loaded configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the state around a running store.
    pub fn new(store: StoreHandle, config: Config) -> Self {
        let ingestor = Ingestor::new(store.clone(), &config.ingest);
        Self {
            store,
            ingestor,
            config: Arc::new(config),
        }
    }
}

/// Maximum published message size (2 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(api_query::index_handler))
        .route("/health", get(api::health_handler))
        .route("/api/query", get(api_query::query_json_handler))
        .route("/api/dump", get(api_admin::dump_handler))
        .route("/api/control/{command}", post(api_admin::control_handler))
        .route(
            "/api/publish/{routing_key}",
            post(api_publish::publish_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
