//! `Date,Close` CSV output.
//!
//! One file per instrument, `<dir>/<code>.csv`, rows in ascending date
//! order. Prices are written without trailing fractional zeros
//! (`124.50` becomes `124.5`), with no index column.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::model::InstrumentSeries;

const HEADER: [&str; 2] = ["Date", "Close"];

/// Output path for a series inside `dir`.
pub fn series_path(dir: &Path, series: &InstrumentSeries) -> PathBuf {
    dir.join(format!("{}.csv", series.instrument()))
}

/// Write `series` to `<dir>/<code>.csv`, creating `dir` if needed.
pub fn write_series_csv(dir: &Path, series: &InstrumentSeries) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let path = series_path(dir, series);
    let mut wtr = csv::Writer::from_path(&path)?;
    write_rows(&mut wtr, series)?;
    wtr.flush()?;

    info!(
        instrument = %series.instrument(),
        rows = series.len(),
        path = %path.display(),
        "Series saved"
    );

    Ok(path)
}

/// Render a series as CSV text.
pub fn series_to_csv_string(series: &InstrumentSeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    write_rows(&mut wtr, series)?;
    let data = wtr
        .into_inner()
        .map_err(|e| io::Error::other(e.to_string()))?;
    String::from_utf8(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, series: &InstrumentSeries) -> Result<()> {
    wtr.write_record(HEADER)?;
    for record in series.records() {
        wtr.write_record([
            record.date.format("%Y-%m-%d").to_string(),
            record.close.normalize().to_string(),
        ])?;
    }
    Ok(())
}
