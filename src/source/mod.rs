// src/source/mod.rs
pub mod traewelling;

use async_trait::async_trait;

use crate::classify::TripPurpose;
use crate::error::FetchError;

/// One trip from the statuses feed. Lives for a single cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripSnapshot {
    pub line_name: String,
    pub category: String,
    pub origin: String,
    pub destination: String,
    pub departure_planned: String,
    pub departure_real: String,
    pub arrival_planned: String,
    pub arrival_real: String,
    pub purpose_code: i64,
}

impl TripSnapshot {
    pub fn purpose(&self) -> TripPurpose {
        TripPurpose::from_code(self.purpose_code)
    }
}

/// Cumulative figures as reported upstream. Distance is in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountAggregate {
    pub distance_m: i64,
    pub duration_min: i64,
    pub points: i64,
}

impl AccountAggregate {
    pub fn distance_km(&self) -> f64 {
        self.distance_m as f64 / 1000.0
    }
}

/// Where trips and aggregates come from. The HTTP client is the production
/// implementation; tests plug in canned sources.
#[async_trait]
pub trait TripSource: Send + Sync {
    async fn fetch_trip_snapshots(&self, account: &str) -> Result<Vec<TripSnapshot>, FetchError>;
    async fn fetch_account_aggregate(&self, account: &str)
        -> Result<AccountAggregate, FetchError>;
}
