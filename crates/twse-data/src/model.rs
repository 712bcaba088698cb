//! Domain types for the monthly close-price pipeline.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// Exchange instrument code (e.g. `0050`, `00670L`).
///
/// Opaque apart from two rules: it is not blank and it contains no path
/// separators, because it doubles as the output file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentCode(String);

impl InstrumentCode {
    pub fn new(code: impl Into<String>) -> Result<Self, DataError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
            return Err(DataError::InvalidInstrument(code));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InstrumentCode {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for InstrumentCode {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstrumentCode> for String {
    fn from(code: InstrumentCode) -> Self {
        code.0
    }
}

/// One calendar month (Gregorian), ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First day of the month.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Value of the `date` query parameter: `YYYYMM01`.
    pub fn request_date(&self) -> String {
        format!("{:04}{:02}01", self.year, self.month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

/// Normalized daily close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Trading date (Gregorian)
    pub date: NaiveDate,
    /// Closing price
    pub close: Decimal,
}

impl PriceRecord {
    pub fn new(date: NaiveDate, close: Decimal) -> Self {
        Self { date, close }
    }
}

/// Deduplicated, date-ascending close series for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSeries {
    instrument: InstrumentCode,
    records: Vec<PriceRecord>,
}

impl InstrumentSeries {
    /// Build a series from records in fetch order.
    ///
    /// The first record seen for a date wins; the result is sorted by date.
    pub fn from_records(
        instrument: InstrumentCode,
        records: impl IntoIterator<Item = PriceRecord>,
    ) -> Self {
        let mut by_date: BTreeMap<NaiveDate, PriceRecord> = BTreeMap::new();
        for record in records {
            by_date.entry(record.date).or_insert(record);
        }

        Self {
            instrument,
            records: by_date.into_values().collect(),
        }
    }

    pub fn empty(instrument: InstrumentCode) -> Self {
        Self {
            instrument,
            records: Vec::new(),
        }
    }

    pub fn instrument(&self) -> &InstrumentCode {
        &self.instrument
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }
}
