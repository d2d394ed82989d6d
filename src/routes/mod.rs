// HTTP routes: landing page, metrics scrape, version

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tower_http::trace::TraceLayer;

use crate::collector::Collector;
use crate::config::ServerConfig;
use crate::error::FatalError;
use crate::models::DomainSnapshot;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) collector: Arc<Collector>,
    pub(crate) domains: watch::Receiver<DomainSnapshot>,
    pub(crate) fatal_tx: mpsc::Sender<FatalError>,
    pub(crate) metrics_path: String,
}

pub fn app(
    collector: Arc<Collector>,
    domains: watch::Receiver<DomainSnapshot>,
    fatal_tx: mpsc::Sender<FatalError>,
    config: &ServerConfig,
) -> Router {
    let state = AppState {
        collector,
        domains,
        fatal_tx,
        metrics_path: config.metrics_path.clone(),
    };
    Router::new()
        .route("/", get(http::index_handler)) // GET /
        .route(&config.metrics_path, get(http::metrics_handler)) // GET /metrics
        .route("/version", get(http::version_handler)) // GET /version
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
