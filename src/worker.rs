// Background domain refresher: polls the bucket listing and publishes each new domain
// snapshot on a watch channel. Collection cycles clone the current snapshot once at start.

use crate::error::FatalError;
use crate::fetcher::StatsFetcher;
use crate::models::DomainSnapshot;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Duration, interval};
use tracing::Instrument;

/// Fetcher, channels and shutdown for the refresher.
pub struct RefresherDeps {
    pub fetcher: Arc<dyn StatsFetcher>,
    pub domains_tx: watch::Sender<DomainSnapshot>,
    pub fatal_tx: mpsc::Sender<FatalError>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub struct RefresherConfig {
    pub refresh_interval_secs: u64,
}

/// Spawns the refresher. The first refresh happens immediately. Exits on shutdown or after
/// forwarding a fatal error.
pub fn spawn(deps: RefresherDeps, config: RefresherConfig) -> tokio::task::JoinHandle<()> {
    let RefresherDeps {
        fetcher,
        domains_tx,
        fatal_tx,
        mut shutdown_rx,
    } = deps;

    let refresher_span = tracing::span!(
        tracing::Level::DEBUG,
        "domain_refresher",
        interval_secs = config.refresh_interval_secs
    );

    tokio::spawn(
        async move {
            let mut tick = interval(Duration::from_secs(config.refresh_interval_secs));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        match fetcher.fetch_domains().await {
                            Ok(domains) => publish(&domains_tx, domains),
                            Err(e) if e.is_fatal() => {
                                tracing::error!(
                                    error = %e,
                                    operation = "fetch_domains",
                                    "domain list refresh failed"
                                );
                                let _ = fatal_tx
                                    .send(FatalError {
                                        family: "domain_list",
                                        scope: "account".to_string(),
                                        source: e,
                                    })
                                    .await;
                                break;
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    operation = "fetch_domains",
                                    "domain list refresh failed; keeping previous list"
                                );
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Domain refresher shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(refresher_span),
    )
}

/// Replaces the published snapshot when the list changed.
fn publish(tx: &watch::Sender<DomainSnapshot>, domains: Vec<String>) {
    let next = DomainSnapshot::new(domains);
    let changed = tx.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next.clone();
        true
    });
    if changed {
        tracing::info!(domains = next.len(), "domain list updated");
    } else {
        tracing::debug!(domains = next.len(), "domain list unchanged");
    }
}
