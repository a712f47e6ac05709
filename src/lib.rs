// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod classify;
pub mod config;
pub mod cycle;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod scheduler;
pub mod source;

pub use crate::config::Config;
pub use crate::cycle::{run_cycle, CycleReport};
pub use crate::error::FetchError;
pub use crate::ledger::{TripIdentity, TripLedger};
