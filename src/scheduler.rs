// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::classify::TimestampPolicy;
use crate::cycle::run_cycle;
use crate::ledger::TripLedger;
use crate::metrics::GaugeSink;
use crate::source::TripSource;

#[derive(Clone, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub accounts: Vec<String>,
    pub policy: TimestampPolicy,
}

/// Spawn the background poll loop: run a cycle, then sleep `interval`, forever.
///
/// The next cycle starts only after the previous one has finished, so cycles
/// never overlap and the loop owns the ledger outright. The interval is fixed;
/// failed accounts are simply retried on the next pass.
pub fn spawn_scheduler<S, G>(cfg: SchedulerCfg, source: Arc<S>, sink: Arc<G>) -> JoinHandle<()>
where
    S: TripSource + ?Sized + 'static,
    G: GaugeSink + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut ledger = TripLedger::new();
        tracing::info!(
            accounts = cfg.accounts.len(),
            interval_secs = cfg.interval.as_secs(),
            policy = ?cfg.policy,
            "poll loop started"
        );
        loop {
            let report = run_cycle(
                source.as_ref(),
                &mut ledger,
                sink.as_ref(),
                &cfg.accounts,
                cfg.policy,
                chrono::Utc::now(),
            )
            .await;

            tracing::debug!(
                ok = report.accounts_ok.len(),
                failed = report.accounts_failed.len(),
                new_trips = report.new_trips.len(),
                tracked = ledger.len(),
                "poll cycle finished"
            );

            tokio::time::sleep(cfg.interval).await;
        }
    })
}
