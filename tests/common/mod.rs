// tests/common/mod.rs
// Shared test doubles: a canned trip source and a sink that remembers gauges.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use traewelling_exporter::metrics::GaugeSink;
use traewelling_exporter::source::{AccountAggregate, TripSnapshot, TripSource};
use traewelling_exporter::{FetchError, TripIdentity};

/// A transport-class error without touching the network.
pub fn transport_error(account: &str) -> FetchError {
    let source = reqwest::Client::new()
        .get("::not a url::")
        .build()
        .unwrap_err();
    FetchError::Transport {
        account: account.to_string(),
        source,
    }
}

#[derive(Default)]
pub struct CannedSource {
    pub trips: Mutex<HashMap<String, Vec<TripSnapshot>>>,
    pub aggregates: Mutex<HashMap<String, AccountAggregate>>,
    /// Accounts whose calls fail with a transport error.
    pub failing: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl CannedSource {
    pub fn set_trips(&self, account: &str, trips: Vec<TripSnapshot>) {
        self.trips.lock().unwrap().insert(account.into(), trips);
    }

    pub fn set_aggregate(&self, account: &str, agg: AccountAggregate) {
        self.aggregates.lock().unwrap().insert(account.into(), agg);
    }

    pub fn fail(&self, account: &str) {
        self.failing.lock().unwrap().push(account.into());
    }

    fn check(&self, account: &str) -> Result<(), FetchError> {
        self.calls.lock().unwrap().push(account.to_string());
        if self.failing.lock().unwrap().iter().any(|a| a == account) {
            return Err(transport_error(account));
        }
        Ok(())
    }
}

#[async_trait]
impl TripSource for CannedSource {
    async fn fetch_trip_snapshots(&self, account: &str) -> Result<Vec<TripSnapshot>, FetchError> {
        self.check(account)?;
        Ok(self
            .trips
            .lock()
            .unwrap()
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_account_aggregate(
        &self,
        account: &str,
    ) -> Result<AccountAggregate, FetchError> {
        self.check(account)?;
        Ok(self
            .aggregates
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub trips: Mutex<HashMap<TripIdentity, f64>>,
    /// account -> (distance_km, duration_min, points)
    pub aggregates: Mutex<HashMap<String, (f64, f64, f64)>>,
}

impl RecordingSink {
    pub fn trip_value(&self, id: &TripIdentity) -> Option<f64> {
        self.trips.lock().unwrap().get(id).copied()
    }

    pub fn aggregate(&self, account: &str) -> Option<(f64, f64, f64)> {
        self.aggregates.lock().unwrap().get(account).copied()
    }

    pub fn trip_series_for(&self, account: &str) -> usize {
        self.trips
            .lock()
            .unwrap()
            .keys()
            .filter(|id| id.account == account)
            .count()
    }
}

impl GaugeSink for RecordingSink {
    fn publish_trip_state(&self, trip: &TripIdentity, active: bool) {
        self.trips
            .lock()
            .unwrap()
            .insert(trip.clone(), if active { 1.0 } else { 0.0 });
    }

    fn publish_account_aggregate(&self, account: &str, aggregate: &AccountAggregate) {
        self.aggregates.lock().unwrap().insert(
            account.to_string(),
            (
                aggregate.distance_km(),
                aggregate.duration_min as f64,
                aggregate.points as f64,
            ),
        );
    }
}

/// RE1 Stuttgart Hbf -> Tübingen, commute, running around `now`.
pub fn re1_trip(now: DateTime<Utc>) -> TripSnapshot {
    TripSnapshot {
        line_name: "RE1".into(),
        category: "RE".into(),
        origin: "Stuttgart Hbf".into(),
        destination: "Tübingen".into(),
        departure_planned: (now - Duration::minutes(12)).to_rfc3339(),
        departure_real: (now - Duration::minutes(10)).to_rfc3339(),
        arrival_planned: (now + Duration::minutes(8)).to_rfc3339(),
        arrival_real: (now + Duration::minutes(10)).to_rfc3339(),
        purpose_code: 2,
    }
}
