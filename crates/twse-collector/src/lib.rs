//! TWSE daily close collector.
//!
//! Downloads monthly `STOCK_DAY` reports for a list of instruments and writes
//! one `Date,Close` CSV per instrument:
//! - environment configuration with CLI overrides
//! - per-instrument collection that never aborts the run
//! - run statistics and month window preview

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::{CollectorConfig, Overrides};
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
