use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use upyun_exporter::*;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let client: Arc<dyn fetcher::StatsFetcher> =
        Arc::new(fetcher::UpyunClient::new(&app_config.upyun)?);

    let (domains_tx, domains_rx) = watch::channel(models::DomainSnapshot::default());
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<error::FatalError>(4);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let refresher_handle = worker::spawn(
        worker::RefresherDeps {
            fetcher: client.clone(),
            domains_tx,
            fatal_tx: fatal_tx.clone(),
            shutdown_rx,
        },
        worker::RefresherConfig {
            refresh_interval_secs: app_config.collection.domain_refresh_secs,
        },
    );

    let window = fetcher::CollectionWindow::new(
        app_config.collection.range_seconds,
        app_config.collection.delay_seconds,
    )?;
    let collector = Arc::new(
        collector::Collector::new(client, window)
            .with_account_health(app_config.collection.account_health),
    );

    let app = routes::app(collector, domains_rx, fatal_tx, &app_config.server);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        metrics_path = %app_config.server.metrics_path,
        "Listening on http://{}",
        addr
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        Some(fatal) = fatal_rx.recv() => {
            tracing::error!(error = %fatal, "fatal API error; exiting");
            return Err(fatal.into());
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = refresher_handle.await;
        }
    }

    Ok(())
}
