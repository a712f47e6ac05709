//! Activity classification for a single trip.
//!
//! Decides whether a trip is in progress at a given instant, and maps the
//! upstream trip-type integer to a purpose label. Nothing here fails: bad
//! input degrades to "not active" / `Unknown` and is logged.

use chrono::{DateTime, Utc};

use crate::source::TripSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TripPurpose {
    Personal,
    Business,
    Commute,
    Unknown,
}

impl TripPurpose {
    /// 0 personal, 1 business, 2 commute; anything else is unknown.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => TripPurpose::Personal,
            1 => TripPurpose::Business,
            2 => TripPurpose::Commute,
            _ => TripPurpose::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TripPurpose::Personal => "personal",
            TripPurpose::Business => "business",
            TripPurpose::Commute => "commute",
            TripPurpose::Unknown => "unknown",
        }
    }
}

/// Which departure/arrival pair the pipeline feeds to [`is_active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
    /// Real-time timestamps only (empty until the service knows them).
    #[default]
    Real,
    Planned,
    /// Real timestamp per field, planned one when the real one is empty.
    RealOrPlanned,
}

impl TimestampPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" | "actual" => Some(TimestampPolicy::Real),
            "planned" => Some(TimestampPolicy::Planned),
            "real_or_planned" | "real-or-planned" => Some(TimestampPolicy::RealOrPlanned),
            _ => None,
        }
    }

    /// Pick `(departure, arrival)` for a trip.
    pub fn select<'a>(&self, trip: &'a TripSnapshot) -> (&'a str, &'a str) {
        fn pick<'a>(real: &'a str, planned: &'a str) -> &'a str {
            if real.trim().is_empty() {
                planned
            } else {
                real
            }
        }
        match self {
            TimestampPolicy::Real => (trip.departure_real.as_str(), trip.arrival_real.as_str()),
            TimestampPolicy::Planned => (
                trip.departure_planned.as_str(),
                trip.arrival_planned.as_str(),
            ),
            TimestampPolicy::RealOrPlanned => (
                pick(&trip.departure_real, &trip.departure_planned),
                pick(&trip.arrival_real, &trip.arrival_planned),
            ),
        }
    }
}

fn parse_rfc3339(ts: &str, which: &'static str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if ts.is_empty() {
        tracing::debug!(field = which, "timestamp missing; trip treated as inactive");
        return None;
    }
    match DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(field = which, value = ts, error = %e, "unparseable timestamp; trip treated as inactive");
            None
        }
    }
}

/// True iff `departure < now < arrival`. Boundary instants are not active.
pub fn is_active(departure: &str, arrival: &str, now: DateTime<Utc>) -> bool {
    let (Some(dep), Some(arr)) = (
        parse_rfc3339(departure, "departure"),
        parse_rfc3339(arrival, "arrival"),
    ) else {
        return false;
    };
    now > dep && now < arr
}
