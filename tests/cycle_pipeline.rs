// tests/cycle_pipeline.rs
//
// Poll → classify → reconcile → publish, driven through canned sources.

mod common;

use chrono::{Duration, Utc};

use common::{re1_trip, CannedSource, RecordingSink};
use traewelling_exporter::classify::{TimestampPolicy, TripPurpose};
use traewelling_exporter::source::AccountAggregate;
use traewelling_exporter::{run_cycle, TripIdentity, TripLedger};

fn accounts(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn active_trip_is_published_and_announced_once() {
    let now = Utc::now();
    let source = CannedSource::default();
    source.set_trips("alice", vec![re1_trip(now)]);
    let sink = RecordingSink::default();
    let mut ledger = TripLedger::new();
    let accts = accounts(&["alice"]);

    let id = TripIdentity {
        account: "alice".into(),
        line_name: "RE1".into(),
        origin: "Stuttgart Hbf".into(),
        destination: "Tübingen".into(),
        category: "RE".into(),
        purpose: TripPurpose::Commute,
    };

    let r1 = run_cycle(&source, &mut ledger, &sink, &accts, TimestampPolicy::Real, now).await;
    assert_eq!(r1.accounts_ok, accts);
    assert_eq!(r1.new_trips, vec![id.clone()]);
    assert_eq!(sink.trip_value(&id), Some(1.0));

    // Same trip again a minute later: still active, no second announcement.
    let later = now + Duration::minutes(1);
    let r2 = run_cycle(&source, &mut ledger, &sink, &accts, TimestampPolicy::Real, later).await;
    assert!(r2.new_trips.is_empty());
    assert_eq!(r2.evicted, 0);
    assert_eq!(sink.trip_value(&id), Some(1.0));
    assert_eq!(sink.trip_series_for("alice"), 1);
}

#[tokio::test]
async fn trip_goes_inactive_after_arrival() {
    let now = Utc::now();
    let source = CannedSource::default();
    source.set_trips("alice", vec![re1_trip(now)]);
    let sink = RecordingSink::default();
    let mut ledger = TripLedger::new();
    let accts = accounts(&["alice"]);

    run_cycle(&source, &mut ledger, &sink, &accts, TimestampPolicy::Real, now).await;
    let after = now + Duration::minutes(30);
    let r = run_cycle(&source, &mut ledger, &sink, &accts, TimestampPolicy::Real, after).await;

    let id = TripIdentity::of("alice", &re1_trip(now));
    assert_eq!(sink.trip_value(&id), Some(0.0));
    assert!(r.new_trips.is_empty());
}

#[tokio::test]
async fn failing_account_does_not_stop_the_others() {
    let now = Utc::now();
    let source = CannedSource::default();
    source.set_trips("alice", vec![re1_trip(now)]);
    source.set_aggregate(
        "alice",
        AccountAggregate {
            distance_m: 542_000,
            duration_min: 75,
            points: 12,
        },
    );
    source.set_trips("carol", vec![]);
    source.fail("bob");
    let sink = RecordingSink::default();
    let mut ledger = TripLedger::new();

    // bob sits between the two healthy accounts.
    let accts = accounts(&["alice", "bob", "carol"]);
    let r = run_cycle(&source, &mut ledger, &sink, &accts, TimestampPolicy::Real, now).await;

    assert_eq!(r.accounts_ok, accounts(&["alice", "carol"]));
    assert_eq!(r.accounts_failed, accounts(&["bob"]));
    assert_eq!(sink.aggregate("alice"), Some((542.0, 75.0, 12.0)));
    assert!(sink.aggregate("carol").is_some());
    assert!(sink.aggregate("bob").is_none());
    assert_eq!(sink.trip_series_for("bob"), 0);
    assert!(ledger.seen_for("bob").is_empty());
}

#[tokio::test]
async fn failed_cycle_leaves_previous_values_untouched() {
    let now = Utc::now();
    let source = CannedSource::default();
    source.set_trips("alice", vec![re1_trip(now)]);
    source.set_aggregate(
        "alice",
        AccountAggregate {
            distance_m: 1_000,
            duration_min: 5,
            points: 1,
        },
    );
    let sink = RecordingSink::default();
    let mut ledger = TripLedger::new();
    let accts = accounts(&["alice"]);

    run_cycle(&source, &mut ledger, &sink, &accts, TimestampPolicy::Real, now).await;
    source.fail("alice");
    let r = run_cycle(
        &source,
        &mut ledger,
        &sink,
        &accts,
        TimestampPolicy::Real,
        now + Duration::minutes(30),
    )
    .await;

    assert_eq!(r.accounts_failed, accts);
    // Stale but intact: still 1 from the last good cycle.
    let id = TripIdentity::of("alice", &re1_trip(now));
    assert_eq!(sink.trip_value(&id), Some(1.0));
    assert_eq!(sink.aggregate("alice"), Some((1.0, 5.0, 1.0)));
    // The ledger is untouched by a failed fetch.
    assert!(ledger.contains(&id));
}

#[tokio::test]
async fn replaced_trip_is_evicted_and_new_one_announced() {
    let now = Utc::now();
    let source = CannedSource::default();
    let first = re1_trip(now);
    source.set_trips("alice", vec![first.clone()]);
    let sink = RecordingSink::default();
    let mut ledger = TripLedger::new();
    let accts = accounts(&["alice"]);

    run_cycle(&source, &mut ledger, &sink, &accts, TimestampPolicy::Real, now).await;

    let mut second = re1_trip(now);
    second.line_name = "RB63".into();
    second.category = "RB".into();
    source.set_trips("alice", vec![second.clone()]);
    let r = run_cycle(&source, &mut ledger, &sink, &accts, TimestampPolicy::Real, now).await;

    assert_eq!(r.evicted, 1);
    assert_eq!(r.new_trips, vec![TripIdentity::of("alice", &second)]);
    assert!(!ledger.contains(&TripIdentity::of("alice", &first)));
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn empty_account_list_is_a_quiet_no_op() {
    let source = CannedSource::default();
    let sink = RecordingSink::default();
    let mut ledger = TripLedger::new();

    let r = run_cycle(&source, &mut ledger, &sink, &[], TimestampPolicy::Real, Utc::now()).await;

    assert!(r.accounts_ok.is_empty());
    assert!(r.accounts_failed.is_empty());
    assert!(source.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_timestamps_publish_inactive() {
    let now = Utc::now();
    let source = CannedSource::default();
    let mut trip = re1_trip(now);
    trip.departure_real = String::new();
    trip.arrival_real = "garbage".into();
    source.set_trips("alice", vec![trip.clone()]);
    let sink = RecordingSink::default();
    let mut ledger = TripLedger::new();

    let r = run_cycle(
        &source,
        &mut ledger,
        &sink,
        &accounts(&["alice"]),
        TimestampPolicy::Real,
        now,
    )
    .await;

    assert_eq!(r.accounts_ok.len(), 1);
    assert_eq!(sink.trip_value(&TripIdentity::of("alice", &trip)), Some(0.0));

    // Planned timestamps still describe a running trip.
    let r = run_cycle(
        &source,
        &mut ledger,
        &sink,
        &accounts(&["alice"]),
        TimestampPolicy::RealOrPlanned,
        now,
    )
    .await;
    assert!(r.new_trips.is_empty());
    // departure falls back to planned; arrival stays the unparseable real value.
    assert_eq!(sink.trip_value(&TripIdentity::of("alice", &trip)), Some(0.0));
    let r = run_cycle(
        &source,
        &mut ledger,
        &sink,
        &accounts(&["alice"]),
        TimestampPolicy::Planned,
        now,
    )
    .await;
    assert!(r.new_trips.is_empty());
    assert_eq!(sink.trip_value(&TripIdentity::of("alice", &trip)), Some(1.0));
}
