// Metric families: what each collection task fetches, how it reduces, what it emits.
//
// A family task moves Fetching -> Aggregating -> Emitting -> Done. It ends in Skipped when a
// recoverable fetch error or degenerate data leaves nothing to publish, and in FailedFatal
// when the API call fails in a way that must stop the exporter.

use tracing::{debug, warn};

use crate::aggregator::{self, StatusRates};
use crate::error::{FatalError, FetchError};
use crate::fetcher::{CollectionWindow, FlowSource, StatsFetcher};
use crate::models::{AccountHealth, BandwidthSample, StatusCodeBucket};
use crate::sink::{DerivedMetric, MetricKind, MetricSink};

/// Per-domain metric families. Each runs as its own task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    /// Edge request rate and bandwidth.
    Traffic,
    /// Edge status-code shares and cache hit ratios.
    StatusDetail,
    /// Back-source bandwidth, request rate and status-code shares.
    Origin,
}

pub const DOMAIN_FAMILIES: [Family; 3] = [Family::Traffic, Family::StatusDetail, Family::Origin];

/// Which API call feeds a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    Bandwidth,
    StatusDetail(FlowSource),
    AccountHealth,
}

/// Raw samples of one family for one scope, as returned by its `FetchPlan`.
#[derive(Debug, Clone)]
pub enum Samples {
    Bandwidth(Vec<BandwidthSample>),
    Buckets(Vec<StatusCodeBucket>),
    Health(AccountHealth),
}

/// Reduces samples to observations labelled for `scope`. Empty means degenerate data.
pub type ReduceFn = fn(&Samples, &str) -> Vec<DerivedMetric>;

/// Everything needed to collect one family: where its samples come from, how they reduce,
/// and which gauges the reduction may produce.
#[derive(Debug, Clone, Copy)]
pub struct FamilyDescriptor {
    pub name: &'static str,
    pub fetch: FetchPlan,
    pub reduce: ReduceFn,
    pub metrics: &'static [MetricKind],
    /// False when every fetch error only means "nothing this cycle".
    pub fatal_errors: bool,
}

/// Account-wide family, collected once per cycle.
pub const ACCOUNT_HEALTH: FamilyDescriptor = FamilyDescriptor {
    name: "account_health",
    fetch: FetchPlan::AccountHealth,
    reduce: reduce_account_health,
    metrics: &[MetricKind::AccountStatusRate],
    fatal_errors: true,
};

impl Family {
    pub const fn descriptor(self) -> FamilyDescriptor {
        match self {
            Family::Traffic => FamilyDescriptor {
                name: "traffic",
                fetch: FetchPlan::Bandwidth,
                reduce: reduce_traffic,
                metrics: &[MetricKind::RequestCount, MetricKind::Bandwidth],
                fatal_errors: true,
            },
            Family::StatusDetail => FamilyDescriptor {
                name: "status_detail",
                fetch: FetchPlan::StatusDetail(FlowSource::Cdn),
                reduce: reduce_status_detail,
                metrics: &[
                    MetricKind::HitRate,
                    MetricKind::FluxHitRate,
                    MetricKind::StatusRate,
                ],
                fatal_errors: true,
            },
            // Back-source detail errors mean "no origin traffic".
            Family::Origin => FamilyDescriptor {
                name: "origin",
                fetch: FetchPlan::StatusDetail(FlowSource::Backsource),
                reduce: reduce_origin,
                metrics: &[
                    MetricKind::OriginBandwidth,
                    MetricKind::OriginRequestCount,
                    MetricKind::OriginStatusRate,
                ],
                fatal_errors: false,
            },
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyState {
    Fetching,
    Aggregating,
    Emitting,
    Done,
    Skipped,
    FailedFatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Recoverable fetch error (bad body shape, empty response).
    FetchFailed,
    /// Zero samples or zero denominators.
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyOutcome {
    /// Number of observations handed to the sink.
    Emitted(usize),
    Skipped(SkipReason),
}

fn transition(family: &str, scope: &str, state: FamilyState) {
    debug!(family, scope, ?state, "family state");
}

/// Fetches, reduces and emits one family for one domain.
pub async fn collect_family(
    family: Family,
    fetcher: &dyn StatsFetcher,
    domain: &str,
    window: CollectionWindow,
    sink: &dyn MetricSink,
) -> Result<FamilyOutcome, FatalError> {
    run(family.descriptor(), fetcher, domain, window, sink).await
}

/// Fetches, reduces and emits account-wide status shares.
pub async fn collect_account_health(
    fetcher: &dyn StatsFetcher,
    window: CollectionWindow,
    sink: &dyn MetricSink,
) -> Result<FamilyOutcome, FatalError> {
    run(ACCOUNT_HEALTH, fetcher, "account", window, sink).await
}

async fn run(
    desc: FamilyDescriptor,
    fetcher: &dyn StatsFetcher,
    scope: &str,
    window: CollectionWindow,
    sink: &dyn MetricSink,
) -> Result<FamilyOutcome, FatalError> {
    let name = desc.name;
    transition(name, scope, FamilyState::Fetching);
    let samples = match fetch(desc.fetch, fetcher, scope, window).await {
        Ok(samples) => samples,
        Err(e) if !desc.fatal_errors => {
            debug!(family = name, scope, error = %e, "no data fetched");
            transition(name, scope, FamilyState::Skipped);
            return Ok(FamilyOutcome::Skipped(SkipReason::FetchFailed));
        }
        Err(e) => return recover_or_fail(name, scope, e),
    };

    transition(name, scope, FamilyState::Aggregating);
    let metrics = (desc.reduce)(&samples, scope);
    if metrics.is_empty() {
        debug!(family = name, scope, "degenerate data; nothing to emit");
        transition(name, scope, FamilyState::Skipped);
        return Ok(FamilyOutcome::Skipped(SkipReason::NoData));
    }

    transition(name, scope, FamilyState::Emitting);
    let n = metrics.len();
    for metric in metrics {
        debug_assert!(
            desc.metrics.contains(&metric.kind),
            "{name} emitted {:?}, which its descriptor does not list",
            metric.kind
        );
        sink.emit(metric);
    }
    transition(name, scope, FamilyState::Done);
    Ok(FamilyOutcome::Emitted(n))
}

async fn fetch(
    plan: FetchPlan,
    fetcher: &dyn StatsFetcher,
    scope: &str,
    window: CollectionWindow,
) -> Result<Samples, FetchError> {
    match plan {
        FetchPlan::Bandwidth => fetcher
            .fetch_bandwidth(scope, window)
            .await
            .map(Samples::Bandwidth),
        FetchPlan::StatusDetail(source) => fetcher
            .fetch_status_detail(scope, window, source)
            .await
            .map(Samples::Buckets),
        FetchPlan::AccountHealth => fetcher
            .fetch_account_health(window)
            .await
            .map(Samples::Health),
    }
}

fn recover_or_fail(
    family: &'static str,
    scope: &str,
    error: FetchError,
) -> Result<FamilyOutcome, FatalError> {
    if error.is_fatal() {
        transition(family, scope, FamilyState::FailedFatal);
        return Err(FatalError {
            family,
            scope: scope.to_string(),
            source: error,
        });
    }
    warn!(family, scope, error = %error, "skipping family for this cycle");
    transition(family, scope, FamilyState::Skipped);
    Ok(FamilyOutcome::Skipped(SkipReason::FetchFailed))
}

fn reduce_traffic(samples: &Samples, domain: &str) -> Vec<DerivedMetric> {
    let Samples::Bandwidth(samples) = samples else {
        return Vec::new();
    };
    let Some(avg) = aggregator::average_bandwidth_and_requests(samples) else {
        return Vec::new();
    };
    vec![
        DerivedMetric::new(MetricKind::RequestCount, [domain], avg.requests_per_minute),
        DerivedMetric::new(MetricKind::Bandwidth, [domain], avg.bandwidth_mib),
    ]
}

fn reduce_status_detail(samples: &Samples, domain: &str) -> Vec<DerivedMetric> {
    let Samples::Buckets(buckets) = samples else {
        return Vec::new();
    };
    let hits = aggregator::hit_rate(buckets);
    let mut out = Vec::new();
    if let Some(pct) = hits.object_pct {
        out.push(DerivedMetric::new(MetricKind::HitRate, [domain], pct));
    }
    if let Some(pct) = hits.byte_pct {
        out.push(DerivedMetric::new(MetricKind::FluxHitRate, [domain], pct));
    }
    if let Some(rates) = aggregator::classify_status_codes(buckets) {
        push_status_rates(&mut out, MetricKind::StatusRate, Some(domain), &rates);
    }
    out
}

fn reduce_origin(samples: &Samples, domain: &str) -> Vec<DerivedMetric> {
    let Samples::Buckets(buckets) = samples else {
        return Vec::new();
    };
    let origin = aggregator::origin_traffic_aggregate(buckets);
    let mut out = Vec::new();
    if let Some(avg) = origin.averages {
        out.push(DerivedMetric::new(
            MetricKind::OriginBandwidth,
            [domain],
            avg.bandwidth_mib,
        ));
        out.push(DerivedMetric::new(
            MetricKind::OriginRequestCount,
            [domain],
            avg.requests_per_minute,
        ));
    }
    if let Some(rates) = origin.status {
        push_status_rates(&mut out, MetricKind::OriginStatusRate, Some(domain), &rates);
    }
    out
}

fn reduce_account_health(samples: &Samples, _scope: &str) -> Vec<DerivedMetric> {
    let Samples::Health(health) = samples else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if let Some(rates) = aggregator::classify_account_health(health) {
        push_status_rates(&mut out, MetricKind::AccountStatusRate, None, &rates);
    }
    out
}

fn push_status_rates(
    out: &mut Vec<DerivedMetric>,
    kind: MetricKind,
    domain: Option<&str>,
    rates: &StatusRates,
) {
    for (status, value) in rates.iter() {
        out.push(DerivedMetric::new(
            kind,
            domain.into_iter().chain([status]),
            value,
        ));
    }
}
