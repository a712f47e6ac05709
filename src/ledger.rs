//! Reconciliation ledger: which trips have already been observed this process.
//!
//! The upstream feed has no stable trip id for our purposes, so a trip is
//! identified by its descriptive fields ([`TripIdentity`]). The ledger keeps
//! one set of identities per account. Each cycle it drops identities the feed
//! no longer reports and marks the current ones as seen; only first sightings
//! are reported back so the caller can log them once.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::classify::TripPurpose;
use crate::source::TripSnapshot;

/// Stable key for "the same trip" across polls.
///
/// Equality, hashing and ordering are field-wise over the tuple
/// (account, line, origin, destination, category, purpose). No field is ever
/// joined into a delimited string, so a station name containing any character
/// cannot make two different trips compare equal. Timestamps are not part of
/// the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripIdentity {
    pub account: String,
    pub line_name: String,
    pub origin: String,
    pub destination: String,
    pub category: String,
    pub purpose: TripPurpose,
}

impl TripIdentity {
    pub fn of(account: &str, trip: &TripSnapshot) -> Self {
        Self {
            account: account.to_string(),
            line_name: trip.line_name.clone(),
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            category: trip.category.clone(),
            purpose: trip.purpose(),
        }
    }
}

/// Outcome of one [`TripLedger::reconcile`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Identities seen for the first time; sorted.
    pub newly_seen: Vec<TripIdentity>,
    /// Number of identities dropped because the feed stopped reporting them.
    pub evicted: usize,
}

#[derive(Debug, Default)]
pub struct TripLedger {
    seen: HashMap<String, HashSet<TripIdentity>>,
}

impl TripLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &TripIdentity) -> bool {
        self.seen
            .get(&id.account)
            .is_some_and(|set| set.contains(id))
    }

    /// Returns true if the identity was not seen before.
    pub fn mark_seen(&mut self, id: TripIdentity) -> bool {
        self.seen.entry(id.account.clone()).or_default().insert(id)
    }

    /// Drop every identity of `account` that is not in `current`.
    /// Returns how many were removed.
    pub fn evict_stale(&mut self, account: &str, current: &HashSet<TripIdentity>) -> usize {
        let Some(set) = self.seen.get_mut(account) else {
            return 0;
        };
        let before = set.len();
        set.retain(|id| current.contains(id));
        let evicted = before - set.len();
        if set.is_empty() {
            self.seen.remove(account);
        }
        evicted
    }

    /// Evict stale entries for `account`, then mark everything in `current`
    /// as seen. Identities in `current` belonging to other accounts are
    /// ignored.
    pub fn reconcile(&mut self, account: &str, current: &HashSet<TripIdentity>) -> Reconciliation {
        let evicted = self.evict_stale(account, current);

        let mut newly_seen = Vec::new();
        for id in current.iter().filter(|id| id.account == account) {
            if self.mark_seen(id.clone()) {
                newly_seen.push(id.clone());
            }
        }
        newly_seen.sort();

        Reconciliation {
            newly_seen,
            evicted,
        }
    }

    /// Sorted identities currently held for `account`.
    pub fn seen_for(&self, account: &str) -> BTreeSet<TripIdentity> {
        self.seen
            .get(account)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Total identities across all accounts.
    pub fn len(&self) -> usize {
        self.seen.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
