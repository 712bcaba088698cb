//! Month window preview.

use std::io::Write;

use chrono::NaiveDate;
use twse_data::calendar::month_keys_until;
use twse_data::MonthKey;

use crate::Result;

/// Write the months a download would request, one per line, and return
/// how many there are.
pub fn write_month_plan<W: Write>(out: &mut W, today: NaiveDate, years: u32) -> Result<usize> {
    let months: Vec<MonthKey> = month_keys_until(today, years);
    for month in &months {
        writeln!(out, "{}\tdate={}", month, month.request_date())?;
    }
    out.flush()?;

    tracing::debug!(
        months = months.len(),
        first = ?months.first().map(|m| m.to_string()),
        last = ?months.last().map(|m| m.to_string()),
        "Month plan written"
    );
    Ok(months.len())
}
