use std::time::Duration;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use metrics_util::MetricKindMask;
use once_cell::sync::OnceCell;

use crate::ledger::TripIdentity;
use crate::source::AccountAggregate;

pub const CURRENT_TRAIN_STATUSES: &str = "traewelling_current_train_statuses";
pub const TOTAL_TRAIN_DISTANCE_KM: &str = "traewelling_total_train_distance_km";
pub const TOTAL_TRAIN_DURATION_MINUTES: &str = "traewelling_total_train_duration_minutes";
pub const TOTAL_POINTS: &str = "traewelling_total_points";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    ///
    /// With `idle_timeout` set, gauges that are not updated within that window
    /// drop out of the exposition; live series are re-set every cycle.
    pub fn init(idle_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = PrometheusBuilder::new();
        if let Some(ttl) = idle_timeout {
            builder = builder.idle_timeout(MetricKindMask::GAUGE, Some(ttl));
        }
        let handle = builder
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_metrics();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .route("/health", get(|| async { "ok" }))
    }
}

/// One-time metric descriptions (so HELP lines show up on /metrics).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_gauge!(
            CURRENT_TRAIN_STATUSES,
            "Whether a trip is in progress (1 = active, 0 = inactive)."
        );
        describe_gauge!(
            TOTAL_TRAIN_DISTANCE_KM,
            "Total train distance of a user in kilometers."
        );
        describe_gauge!(
            TOTAL_TRAIN_DURATION_MINUTES,
            "Total train duration of a user in minutes."
        );
        describe_gauge!(TOTAL_POINTS, "Total points of a user.");
        describe_counter!("traewelling_poll_cycles_total", "Completed poll cycles.");
        describe_counter!(
            "traewelling_fetch_errors_total",
            "Failed remote calls by account and failure kind."
        );
        describe_counter!(
            "traewelling_new_trips_total",
            "Trips observed for the first time since process start."
        );
        describe_gauge!(
            "traewelling_last_cycle_ts",
            "Unix ts when the last poll cycle finished."
        );
        describe_histogram!(
            "traewelling_cycle_duration_ms",
            "Poll cycle duration in milliseconds."
        );
        describe_histogram!(
            "traewelling_fetch_duration_ms",
            "Remote call duration in milliseconds."
        );
    });
}

/// Write side of the published gauges. Gauges are last-write-wins, so every
/// call is idempotent for equal arguments.
pub trait GaugeSink: Send + Sync {
    fn publish_trip_state(&self, trip: &TripIdentity, active: bool);
    fn publish_account_aggregate(&self, account: &str, aggregate: &AccountAggregate);
}

/// Publishes through the `metrics` facade into whatever recorder is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusPublisher;

impl GaugeSink for PrometheusPublisher {
    fn publish_trip_state(&self, trip: &TripIdentity, active: bool) {
        gauge!(
            CURRENT_TRAIN_STATUSES,
            "username" => trip.account.clone(),
            "line_name" => trip.line_name.clone(),
            "origin" => trip.origin.clone(),
            "destination" => trip.destination.clone(),
            "train_type" => trip.category.clone(),
            "trip_type" => trip.purpose.label()
        )
        .set(if active { 1.0 } else { 0.0 });
    }

    fn publish_account_aggregate(&self, account: &str, aggregate: &AccountAggregate) {
        let username = account.to_string();
        gauge!(TOTAL_TRAIN_DISTANCE_KM, "username" => username.clone())
            .set(aggregate.distance_km());
        gauge!(TOTAL_TRAIN_DURATION_MINUTES, "username" => username.clone())
            .set(aggregate.duration_min as f64);
        gauge!(TOTAL_POINTS, "username" => username).set(aggregate.points as f64);
    }
}
