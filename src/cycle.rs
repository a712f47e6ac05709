//! One poll → classify → reconcile → publish pass over every account.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};

use crate::classify::{is_active, TimestampPolicy};
use crate::error::FetchError;
use crate::ledger::{TripIdentity, TripLedger};
use crate::metrics::GaugeSink;
use crate::source::{TripSnapshot, TripSource};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub accounts_ok: Vec<String>,
    pub accounts_failed: Vec<String>,
    pub new_trips: Vec<TripIdentity>,
    pub evicted: usize,
}

/// What a single account contributed to the cycle.
#[derive(Debug, Default)]
struct AccountOutcome {
    new_trips: Vec<TripIdentity>,
    evicted: usize,
}

/// Run one pass. Failures are contained per account: a failing account is
/// logged, counted and skipped, and its gauges keep their previous values.
///
/// Accounts are handled strictly one after another, so the ledger is never
/// mutated concurrently.
pub async fn run_cycle<S, G>(
    source: &S,
    ledger: &mut TripLedger,
    sink: &G,
    accounts: &[String],
    policy: TimestampPolicy,
    now: DateTime<Utc>,
) -> CycleReport
where
    S: TripSource + ?Sized,
    G: GaugeSink + ?Sized,
{
    let t0 = std::time::Instant::now();
    let mut report = CycleReport::default();

    if accounts.is_empty() {
        tracing::warn!("no accounts configured (TRAEWELLING_USERNAMES); nothing to poll");
    }

    for account in accounts {
        match update_account(source, ledger, sink, account, policy, now).await {
            Ok(outcome) => {
                tracing::info!(
                    account = %account,
                    new_trips = outcome.new_trips.len(),
                    evicted = outcome.evicted,
                    "updated metrics"
                );
                report.accounts_ok.push(account.clone());
                report.new_trips.extend(outcome.new_trips);
                report.evicted += outcome.evicted;
            }
            Err(e) => {
                tracing::warn!(account = %account, kind = e.kind(), error = %e, "skipping account this cycle");
                counter!(
                    "traewelling_fetch_errors_total",
                    "username" => account.clone(),
                    "kind" => e.kind()
                )
                .increment(1);
                report.accounts_failed.push(account.clone());
            }
        }
    }

    counter!("traewelling_poll_cycles_total").increment(1);
    gauge!("traewelling_last_cycle_ts").set(now.timestamp().max(0) as f64);
    histogram!("traewelling_cycle_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    report
}

async fn update_account<S, G>(
    source: &S,
    ledger: &mut TripLedger,
    sink: &G,
    account: &str,
    policy: TimestampPolicy,
    now: DateTime<Utc>,
) -> Result<AccountOutcome, FetchError>
where
    S: TripSource + ?Sized,
    G: GaugeSink + ?Sized,
{
    // Both calls must succeed before anything is published for the account.
    let trips = source.fetch_trip_snapshots(account).await?;
    let aggregate = source.fetch_account_aggregate(account).await?;

    let states = classify_trips(account, &trips, policy, now);
    let current: HashSet<TripIdentity> = states.keys().cloned().collect();
    let rec = ledger.reconcile(account, &current);

    for id in &rec.newly_seen {
        tracing::info!(
            account = %account,
            line = %id.line_name,
            origin = %id.origin,
            destination = %id.destination,
            purpose = id.purpose.label(),
            "new trip observed"
        );
    }
    if !rec.newly_seen.is_empty() {
        counter!("traewelling_new_trips_total", "username" => account.to_string())
            .increment(rec.newly_seen.len() as u64);
    }
    if rec.evicted > 0 {
        tracing::debug!(account = %account, evicted = rec.evicted, "dropped stale trips");
    }

    for (id, active) in &states {
        sink.publish_trip_state(id, *active);
    }
    sink.publish_account_aggregate(account, &aggregate);

    Ok(AccountOutcome {
        new_trips: rec.newly_seen,
        evicted: rec.evicted,
    })
}

/// Collapse a snapshot to one activity flag per identity. The feed returns
/// history too, so the same route may appear several times; the label set is
/// active if any of its instances is.
fn classify_trips(
    account: &str,
    trips: &[TripSnapshot],
    policy: TimestampPolicy,
    now: DateTime<Utc>,
) -> HashMap<TripIdentity, bool> {
    let mut states: HashMap<TripIdentity, bool> = HashMap::with_capacity(trips.len());
    for trip in trips {
        let (dep, arr) = policy.select(trip);
        let active = is_active(dep, arr, now);
        *states.entry(TripIdentity::of(account, trip)).or_insert(false) |= active;
    }
    states
}
