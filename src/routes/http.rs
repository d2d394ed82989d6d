// GET handlers: index, metrics, version

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

use super::AppState;
use crate::sink::{DerivedMetric, MetricKind, MetricSink, SnapshotSink, exposition};
use crate::version::{NAME, VERSION};

/// GET /: landing page linking to the metrics path.
pub(super) async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    Html(format!(
        "<html>\n<head><title>UPYUN CDN Exporter</title></head>\n<body>\n<h1>UPYUN CDN Exporter</h1>\n<p><a href='{0}'>Metrics</a></p>\n</body>\n</html>\n",
        state.metrics_path
    ))
}

/// GET /metrics: runs one collection cycle over the current domain snapshot.
pub(super) async fn metrics_handler(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let domains = state.domains.borrow().clone();
    let sink = Arc::new(SnapshotSink::new());

    if let Err(e) = state.collector.collect_cycle(&domains, sink.clone()).await {
        tracing::error!(error = %e, "fatal collection error; shutting down");
        let body = e.to_string();
        if state.fatal_tx.try_send(e).is_err() {
            tracing::debug!("fatal channel full or closed");
        }
        return (StatusCode::SERVICE_UNAVAILABLE, body).into_response();
    }

    sink.emit(DerivedMetric::new(
        MetricKind::ScrapeDuration,
        Vec::<String>::new(),
        started.elapsed().as_secs_f64(),
    ));
    match exposition::render(&sink.metrics()) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}
