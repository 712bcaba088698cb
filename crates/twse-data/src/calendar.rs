//! ROC calendar conversion and month-window enumeration.
//!
//! TWSE reports dates in the ROC (Minguo) calendar, whose year is the
//! Gregorian year minus 1911 (`114/08/07` is 2025-08-07).

use chrono::{Local, Months, NaiveDate};

use crate::model::MonthKey;

/// Offset between ROC era years and Gregorian years.
pub const ROC_YEAR_OFFSET: i32 = 1911;

/// ROC era year to Gregorian year.
pub const fn roc_year_to_gregorian(roc_year: i32) -> i32 {
    roc_year + ROC_YEAR_OFFSET
}

/// Parse an ROC `YYY/MM/DD` date cell.
///
/// Exactly three `/`-separated numeric components are required and the
/// result must be a real calendar date.
pub fn parse_roc_date(cell: &str) -> Option<NaiveDate> {
    let mut parts = cell.trim().split('/');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let year: i32 = year.trim().parse().ok()?;
    let month: u32 = month.trim().parse().ok()?;
    let day: u32 = day.trim().parse().ok()?;

    NaiveDate::from_ymd_opt(roc_year_to_gregorian(year), month, day)
}

/// Months from `today - lookback_years` through `today`, inclusive, ascending.
///
/// The start keeps today's month and day (Feb 29 clamps to Feb 28), so the
/// window always spans `12 * lookback_years + 1` months.
pub fn month_keys_until(today: NaiveDate, lookback_years: u32) -> Vec<MonthKey> {
    let start = today
        .checked_sub_months(Months::new(lookback_years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN);

    let end = MonthKey::of(today);
    let mut keys = Vec::new();
    let mut current = MonthKey::of(start);
    while current <= end {
        keys.push(current);
        current = current.next();
    }
    keys
}

/// Month window ending at the current local date.
pub fn month_keys(lookback_years: u32) -> Vec<MonthKey> {
    month_keys_until(Local::now().date_naive(), lookback_years)
}
