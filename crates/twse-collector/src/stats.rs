//! Collection statistics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statistics for one download run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Instruments attempted
    pub total: usize,
    /// Instruments written to CSV
    pub success: usize,
    /// Instruments that produced no records (no file written)
    pub empty: usize,
    /// Instruments whose CSV could not be written
    pub errors: usize,
    /// Records written across all files
    pub total_records: usize,
    /// Months abandoned after exhausting their attempts
    pub failed_months: usize,
    /// Codes of instruments that were not written
    pub failed_instruments: Vec<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Success rate (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// True when at least one instrument ended without a file.
    pub fn has_failures(&self) -> bool {
        !self.failed_instruments.is_empty()
    }

    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            empty = self.empty,
            errors = self.errors,
            total_records = self.total_records,
            failed_months = self.failed_months,
            failed_instruments = ?self.failed_instruments,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "Collection finished"
        );
    }
}
