// Collection cycle: fan out over one domain snapshot.
//
// Domains are visited one at a time; the families of a domain run as concurrent tasks and
// are all joined before the next domain starts. Account health, when enabled, runs beside
// the domain loop and is joined at the end of the cycle.

pub mod families;

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::error::FatalError;
use crate::fetcher::{CollectionWindow, StatsFetcher};
use crate::models::DomainSnapshot;
use crate::sink::{DerivedMetric, MetricKind, MetricSink};

pub use families::{
    ACCOUNT_HEALTH, DOMAIN_FAMILIES, Family, FamilyDescriptor, FamilyOutcome, FamilyState,
    FetchPlan, ReduceFn, Samples, SkipReason, collect_account_health, collect_family,
};

/// `reason` label of the sentinel emitted when there is nothing to collect.
pub const EMPTY_DOMAIN_LIST_REASON: &str = "empty domain list";

/// Tally of one cycle (or one domain).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub domains: usize,
    pub families_done: usize,
    pub families_skipped: usize,
    pub metrics_emitted: usize,
    /// Tasks that panicked or were cancelled.
    pub task_failures: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: FamilyOutcome) {
        match outcome {
            FamilyOutcome::Emitted(n) => {
                self.families_done += 1;
                self.metrics_emitted += n;
            }
            FamilyOutcome::Skipped(_) => self.families_skipped += 1,
        }
    }

    fn absorb(&mut self, other: CycleReport) {
        self.domains += other.domains;
        self.families_done += other.families_done;
        self.families_skipped += other.families_skipped;
        self.metrics_emitted += other.metrics_emitted;
        self.task_failures += other.task_failures;
    }
}

pub struct Collector {
    fetcher: Arc<dyn StatsFetcher>,
    window: CollectionWindow,
    account_health: bool,
}

impl Collector {
    pub fn new(fetcher: Arc<dyn StatsFetcher>, window: CollectionWindow) -> Self {
        Self {
            fetcher,
            window,
            account_health: false,
        }
    }

    pub fn with_account_health(mut self, enabled: bool) -> Self {
        self.account_health = enabled;
        self
    }

    pub fn window(&self) -> CollectionWindow {
        self.window
    }

    /// Runs one cycle over `domains`. A fatal error is returned once the failing domain's
    /// other tasks (and the account task) have finished; remaining domains are not visited.
    #[instrument(skip_all, fields(domains = domains.len()))]
    pub async fn collect_cycle(
        &self,
        domains: &DomainSnapshot,
        sink: Arc<dyn MetricSink>,
    ) -> Result<CycleReport, FatalError> {
        if domains.is_empty() {
            warn!("domain list is empty; emitting collection error");
            sink.emit(DerivedMetric::new(
                MetricKind::CollectionError,
                [EMPTY_DOMAIN_LIST_REASON],
                1.0,
            ));
            return Ok(CycleReport::default());
        }

        let account_task = self.account_health.then(|| {
            let fetcher = self.fetcher.clone();
            let sink = sink.clone();
            let window = self.window;
            tokio::spawn(async move {
                collect_account_health(fetcher.as_ref(), window, sink.as_ref()).await
            })
        });

        let mut report = CycleReport::default();
        let mut fatal = None;
        for domain in domains.iter() {
            match self.collect_domain(domain, sink.clone()).await {
                Ok(r) => report.absorb(r),
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }
        }

        if let Some(handle) = account_task {
            match handle.await {
                Ok(Ok(outcome)) => report.record(outcome),
                Ok(Err(e)) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(e) => {
                    warn!(family = ACCOUNT_HEALTH.name, error = %e, "collection task failed");
                    report.task_failures += 1;
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => {
                info!(
                    domains = report.domains,
                    families_done = report.families_done,
                    families_skipped = report.families_skipped,
                    metrics_emitted = report.metrics_emitted,
                    "collection cycle complete"
                );
                Ok(report)
            }
        }
    }

    /// Runs every family of one domain concurrently and waits for all of them.
    #[instrument(skip(self, sink))]
    pub async fn collect_domain(
        &self,
        domain: &str,
        sink: Arc<dyn MetricSink>,
    ) -> Result<CycleReport, FatalError> {
        let mut tasks = JoinSet::new();
        for family in DOMAIN_FAMILIES {
            let fetcher = self.fetcher.clone();
            let sink = sink.clone();
            let domain = domain.to_string();
            let window = self.window;
            tasks.spawn(async move {
                collect_family(family, fetcher.as_ref(), &domain, window, sink.as_ref()).await
            });
        }

        let mut report = CycleReport {
            domains: 1,
            ..CycleReport::default()
        };
        let mut fatal = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => report.record(outcome),
                Ok(Err(e)) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(e) => {
                    warn!(domain, error = %e, "collection task failed");
                    report.task_failures += 1;
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}
