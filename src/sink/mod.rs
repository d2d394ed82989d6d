// Metric sink: where collection tasks hand their gauges.

pub mod exposition;

use std::sync::{Mutex, PoisonError};

pub const NAMESPACE: &str = "upyun";

/// Static description of one gauge family: full name, help text and label names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

const DOMAIN: &[&str] = &["domain"];
const DOMAIN_STATUS: &[&str] = &["domain", "status"];

/// Every gauge family the exporter can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    RequestCount,
    Bandwidth,
    HitRate,
    FluxHitRate,
    StatusRate,
    OriginBandwidth,
    OriginRequestCount,
    OriginStatusRate,
    AccountStatusRate,
    CollectionError,
    ScrapeDuration,
}

impl MetricKind {
    pub const fn descriptor(self) -> MetricDescriptor {
        match self {
            MetricKind::RequestCount => MetricDescriptor {
                name: "upyun_cdn_request_count",
                help: "CDN requests per minute",
                labels: DOMAIN,
            },
            MetricKind::Bandwidth => MetricDescriptor {
                name: "upyun_cdn_bandwidth",
                help: "CDN bandwidth (MiB/s)",
                labels: DOMAIN,
            },
            MetricKind::HitRate => MetricDescriptor {
                name: "upyun_cdn_hit_rate",
                help: "CDN cache hit rate by request count (%)",
                labels: DOMAIN,
            },
            MetricKind::FluxHitRate => MetricDescriptor {
                name: "upyun_cdn_flux_hit_rate",
                help: "CDN cache hit rate by bytes (%)",
                labels: DOMAIN,
            },
            MetricKind::StatusRate => MetricDescriptor {
                name: "upyun_cdn_status_rate",
                help: "CDN response status share (%)",
                labels: DOMAIN_STATUS,
            },
            MetricKind::OriginBandwidth => MetricDescriptor {
                name: "upyun_backsource_resource_bandwidth",
                help: "Back-source bandwidth (MiB/s)",
                labels: DOMAIN,
            },
            MetricKind::OriginRequestCount => MetricDescriptor {
                name: "upyun_cdn_resource_request_count",
                help: "Back-source requests per minute",
                labels: DOMAIN,
            },
            MetricKind::OriginStatusRate => MetricDescriptor {
                name: "upyun_cdn_backsource_status_rate",
                help: "Back-source response status share (%)",
                labels: DOMAIN_STATUS,
            },
            MetricKind::AccountStatusRate => MetricDescriptor {
                name: "upyun_account_status_rate",
                help: "Account-wide response status share (%)",
                labels: &["status"],
            },
            MetricKind::CollectionError => MetricDescriptor {
                name: "upyun_exporter_collection_error",
                help: "Set to 1 when a collection cycle had nothing to report",
                labels: &["reason"],
            },
            MetricKind::ScrapeDuration => MetricDescriptor {
                name: "upyun_exporter_scrape_duration_seconds",
                help: "Duration of the last collection cycle",
                labels: &[],
            },
        }
    }
}

/// One observation: a gauge family, its label values (in descriptor order) and a value.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetric {
    pub kind: MetricKind,
    pub labels: Vec<String>,
    pub value: f64,
}

impl DerivedMetric {
    pub fn new<I, S>(kind: MetricKind, labels: I, value: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            labels: labels.into_iter().map(Into::into).collect(),
            value,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.descriptor().name
    }
}

/// Receives observations from concurrently running collection tasks.
pub trait MetricSink: Send + Sync {
    fn emit(&self, metric: DerivedMetric);
}

/// Collects one cycle's observations in memory. Non-finite values are dropped.
#[derive(Debug, Default)]
pub struct SnapshotSink {
    metrics: Mutex<Vec<DerivedMetric>>,
}

impl SnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of everything emitted so far.
    pub fn metrics(&self) -> Vec<DerivedMetric> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_metrics(self) -> Vec<DerivedMetric> {
        self.metrics
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricSink for SnapshotSink {
    fn emit(&self, metric: DerivedMetric) {
        if !metric.value.is_finite() {
            tracing::debug!(
                metric = metric.name(),
                labels = ?metric.labels,
                "dropping non-finite observation"
            );
            return;
        }
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(metric);
    }
}
