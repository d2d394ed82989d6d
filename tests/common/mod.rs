// Shared test helpers: scripted fetcher and sample builders

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use upyun_exporter::error::FetchError;
use upyun_exporter::fetcher::{CollectionWindow, FlowSource, StatsFetcher};
use upyun_exporter::models::*;
use upyun_exporter::sink::DerivedMetric;

/// What a scripted call returns. `FetchError` is not `Clone`, so errors are rebuilt per call.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    /// Body did not match the expected shape (recoverable).
    Malformed,
    /// Empty body (recoverable).
    Empty,
    /// Non-success HTTP status (fatal).
    Status(u16),
}

impl<T: Clone> Reply<T> {
    fn resolve(&self, endpoint: &'static str, subject: &str) -> Result<T, FetchError> {
        match self {
            Reply::Ok(v) => Ok(v.clone()),
            Reply::Malformed => Err(FetchError::Decode {
                endpoint,
                subject: subject.to_string(),
                source: serde_json::from_str::<Vec<u8>>("{").unwrap_err(),
            }),
            Reply::Empty => Err(FetchError::Empty {
                endpoint,
                subject: subject.to_string(),
            }),
            Reply::Status(status) => Err(FetchError::Status {
                endpoint,
                status: *status,
                body: "denied".to_string(),
            }),
        }
    }
}

/// Script for one domain. Missing parts answer with an empty body.
#[derive(Debug, Clone)]
pub struct DomainScript {
    pub bandwidth: Reply<Vec<BandwidthSample>>,
    pub cdn_detail: Reply<Vec<StatusCodeBucket>>,
    pub origin_detail: Reply<Vec<StatusCodeBucket>>,
}

impl Default for DomainScript {
    fn default() -> Self {
        Self {
            bandwidth: Reply::Empty,
            cdn_detail: Reply::Empty,
            origin_detail: Reply::Empty,
        }
    }
}

pub struct MockFetcher {
    pub scripts: HashMap<String, DomainScript>,
    pub health: Reply<AccountHealth>,
    pub domain_lists: Mutex<Vec<Reply<Vec<String>>>>,
    pub latency: Duration,
    pub calls: AtomicUsize,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self {
            scripts: HashMap::new(),
            health: Reply::Empty,
            domain_lists: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockFetcher {
    pub fn with_domain(mut self, domain: &str, script: DomainScript) -> Self {
        self.scripts.insert(domain.to_string(), script);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_health(mut self, health: Reply<AccountHealth>) -> Self {
        self.health = health;
        self
    }

    /// Domain listings returned in order; the last one repeats.
    pub fn with_domain_lists(self, lists: Vec<Reply<Vec<String>>>) -> Self {
        *self.domain_lists.lock().unwrap() = lists;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn script(&self, domain: &str) -> DomainScript {
        self.scripts.get(domain).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl StatsFetcher for MockFetcher {
    async fn fetch_bandwidth(
        &self,
        domain: &str,
        _window: CollectionWindow,
    ) -> Result<Vec<BandwidthSample>, FetchError> {
        self.pause().await;
        self.script(domain).bandwidth.resolve("/v2/statistics", domain)
    }

    async fn fetch_status_detail(
        &self,
        domain: &str,
        _window: CollectionWindow,
        source: FlowSource,
    ) -> Result<Vec<StatusCodeBucket>, FetchError> {
        self.pause().await;
        let script = self.script(domain);
        match source {
            FlowSource::Cdn => script.cdn_detail.resolve("/flow/common_data", domain),
            FlowSource::Backsource => script.origin_detail.resolve("/flow/common_data", domain),
        }
    }

    async fn fetch_account_health(
        &self,
        _window: CollectionWindow,
    ) -> Result<AccountHealth, FetchError> {
        self.pause().await;
        self.health.resolve("/flow/health_degree", "account")
    }

    async fn fetch_domains(&self) -> Result<Vec<String>, FetchError> {
        self.pause().await;
        let reply = {
            let mut lists = self.domain_lists.lock().unwrap();
            if lists.len() > 1 {
                lists.remove(0)
            } else {
                lists.first().cloned().unwrap_or(Reply::Ok(Vec::new()))
            }
        };
        reply.resolve("/buckets", "bucket list")
    }
}

pub fn window() -> CollectionWindow {
    CollectionWindow::new(1800, 300).unwrap()
}

pub fn sample(requests: f64, bandwidth: f64) -> BandwidthSample {
    BandwidthSample {
        requests,
        bandwidth,
        ..BandwidthSample::default()
    }
}

/// Bucket with the given status counts; requests is the classified total.
pub fn bucket(codes: &[(StatusCode, u64)]) -> StatusCodeBucket {
    let counts: StatusCounts = codes.iter().copied().collect();
    StatusCodeBucket {
        counts,
        requests: counts.total(),
        ..StatusCodeBucket::default()
    }
}

pub fn hit_bucket(hits: u64, requests: u64, hit_bytes: u64, bytes: u64) -> StatusCodeBucket {
    StatusCodeBucket {
        hits,
        requests,
        hit_bytes,
        bytes,
        ..StatusCodeBucket::default()
    }
}

/// A domain whose every family has data.
pub fn healthy_domain() -> DomainScript {
    let mut edge = bucket(&[
        (StatusCode::Ok200, 80),
        (StatusCode::NotModified304, 10),
        (StatusCode::NotFound404, 8),
        (StatusCode::BadGateway502, 2),
    ]);
    edge.hits = 90;
    edge.hit_bytes = 900;
    edge.bytes = 1000;
    let mut origin = bucket(&[(StatusCode::Ok200, 9), (StatusCode::Internal500, 1)]);
    origin.bandwidth = 1024.0 * 1024.0;
    DomainScript {
        bandwidth: Reply::Ok(vec![sample(500.0, 2.0 * 1024.0 * 1024.0)]),
        cdn_detail: Reply::Ok(vec![edge]),
        origin_detail: Reply::Ok(vec![origin]),
    }
}

/// Order-independent view of emitted metrics.
pub fn sorted(mut metrics: Vec<DerivedMetric>) -> Vec<DerivedMetric> {
    metrics.sort_by(|a, b| (a.kind, &a.labels).cmp(&(b.kind, &b.labels)));
    metrics
}

pub fn find<'a>(metrics: &'a [DerivedMetric], name: &str, labels: &[&str]) -> Option<&'a DerivedMetric> {
    metrics
        .iter()
        .find(|m| m.name() == name && m.labels.iter().map(String::as_str).eq(labels.iter().copied()))
}
