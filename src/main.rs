//! Träwelling exporter: binary entrypoint.
//! Starts the background poll loop and serves `/metrics` for Prometheus.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use traewelling_exporter::config::Config;
use traewelling_exporter::metrics::{Metrics, PrometheusPublisher};
use traewelling_exporter::scheduler::{spawn_scheduler, SchedulerCfg};
use traewelling_exporter::source::traewelling::TraewellingClient;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("traewelling_exporter=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::load().context("loading configuration")?;
    if cfg.token.is_none() {
        tracing::warn!("TRAEWELLING_TOKEN is not set; every fetch will fail until it is");
    }

    let metrics = Metrics::init(cfg.metrics_idle_timeout)?;

    let client = TraewellingClient::new(&cfg.base_url, cfg.token.clone(), cfg.request_timeout)?;
    let _poller = spawn_scheduler(
        SchedulerCfg {
            interval: cfg.poll_interval,
            accounts: cfg.usernames.clone(),
            policy: cfg.timestamp_policy,
        },
        Arc::new(client),
        Arc::new(PrometheusPublisher),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.metrics_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics listener on {addr}"))?;
    tracing::info!(%addr, "serving /metrics");

    axum::serve(listener, metrics.router())
        .await
        .context("metrics server")?;
    Ok(())
}
