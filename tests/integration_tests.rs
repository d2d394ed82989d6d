// Integration tests: HTTP endpoints over a scripted fetcher

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::{DomainScript, MockFetcher, Reply, healthy_domain, window};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use upyun_exporter::collector::Collector;
use upyun_exporter::config::AppConfig;
use upyun_exporter::error::FatalError;
use upyun_exporter::models::DomainSnapshot;
use upyun_exporter::routes;

const TEST_CONFIG: &str = r#"
[server]
port = 9300
host = "127.0.0.1"
metrics_path = "/metrics"

[upyun]
token = "t"
bucket_token = "b"
"#;

struct TestApp {
    server: TestServer,
    domains_tx: watch::Sender<DomainSnapshot>,
    fatal_rx: mpsc::Receiver<FatalError>,
}

fn test_app(fetcher: MockFetcher, domains: &[&str]) -> TestApp {
    let config = AppConfig::load_from_str(TEST_CONFIG).unwrap();
    let collector = Arc::new(Collector::new(Arc::new(fetcher), window()));
    let (domains_tx, domains_rx) = watch::channel(DomainSnapshot::new(domains.iter().copied()));
    let (fatal_tx, fatal_rx) = mpsc::channel(1);
    let app = routes::app(collector, domains_rx, fatal_tx, &config.server);
    TestApp {
        server: TestServer::new(app).unwrap(),
        domains_tx,
        fatal_rx,
    }
}

#[tokio::test]
async fn test_root_endpoint_links_metrics() {
    let app = test_app(MockFetcher::default(), &[]);
    let response = app.server.get("/").await;
    response.assert_status_ok();
    assert!(response.text().contains("href='/metrics'"));
}

#[tokio::test]
async fn test_version_endpoint() {
    let app = test_app(MockFetcher::default(), &[]);
    let response = app.server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("upyun-exporter")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_metrics_endpoint_renders_domain_gauges() {
    let fetcher = MockFetcher::default().with_domain("a.example.com", healthy_domain());
    let app = test_app(fetcher, &["a.example.com"]);

    let response = app.server.get("/metrics").await;
    response.assert_status_ok();
    let content_type = response.header("content-type");
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));

    let body = response.text();
    assert!(body.contains("# TYPE upyun_cdn_request_count gauge"));
    assert!(body.contains("upyun_cdn_request_count{domain=\"a.example.com\"} 100"));
    assert!(body.contains("upyun_cdn_status_rate{domain=\"a.example.com\",status=\"2xx\"} 80"));
    assert!(body.contains("upyun_exporter_scrape_duration_seconds"));
    assert!(!body.contains("upyun_exporter_collection_error"));
}

#[tokio::test]
async fn test_metrics_endpoint_reports_empty_domain_list() {
    let app = test_app(MockFetcher::default(), &[]);
    let response = app.server.get("/metrics").await;
    response.assert_status_ok();
    assert!(
        response
            .text()
            .contains("upyun_exporter_collection_error{reason=\"empty domain list\"} 1")
    );
}

#[tokio::test]
async fn test_metrics_endpoint_follows_domain_updates() {
    let fetcher = MockFetcher::default()
        .with_domain("a.example.com", healthy_domain())
        .with_domain("b.example.com", healthy_domain());
    let app = test_app(fetcher, &["a.example.com"]);

    let before = app.server.get("/metrics").await.text();
    assert!(!before.contains("b.example.com"));

    app.domains_tx
        .send(DomainSnapshot::new(["a.example.com", "b.example.com"]))
        .unwrap();
    let after = app.server.get("/metrics").await.text();
    assert!(after.contains("upyun_cdn_bandwidth{domain=\"b.example.com\"}"));
}

#[tokio::test]
async fn test_metrics_endpoint_fatal_error_returns_503_and_signals_shutdown() {
    let failing = DomainScript {
        cdn_detail: Reply::Status(401),
        ..healthy_domain()
    };
    let fetcher = MockFetcher::default().with_domain("a.example.com", failing);
    let mut app = test_app(fetcher, &["a.example.com"]);

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.text().contains("401"));

    let fatal = app.fatal_rx.try_recv().expect("fatal error forwarded");
    assert_eq!(fatal.family, "status_detail");
    assert_eq!(fatal.scope, "a.example.com");
}
