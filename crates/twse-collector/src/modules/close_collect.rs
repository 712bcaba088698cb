//! Daily close download.
//!
//! Instruments are processed one at a time. A failure for one instrument
//! (no records, or a CSV write error) is logged and counted, then the run
//! moves on to the next one.

use std::path::Path;
use std::time::Instant;

use twse_data::calendar::month_keys;
use twse_data::{
    write_series_csv, DataError, InstrumentCode, MonthKey, RangeFetcher, RequestTransport,
    ReqwestTransport,
};

use crate::{CollectionStats, CollectorConfig, Result};

/// Download every configured instrument over the configured lookback.
pub async fn download_closes(config: &CollectorConfig) -> Result<CollectionStats> {
    let instruments = config.instruments()?;
    let months = month_keys(config.lookback_years);

    let transport = ReqwestTransport::new(config.transport_options()).map_err(DataError::from)?;
    let fetcher = RangeFetcher::new(transport, config.fetch_config());

    let stats = collect_closes(&fetcher, &instruments, &months, &config.output_dir).await;

    if fetcher.transport().insecure_fallback_used() {
        tracing::warn!("Some responses were fetched without certificate verification");
    }

    Ok(stats)
}

/// Fetch `months` for each instrument and write one CSV per instrument.
pub async fn collect_closes<T: RequestTransport>(
    fetcher: &RangeFetcher<T>,
    instruments: &[InstrumentCode],
    months: &[MonthKey],
    out_dir: &Path,
) -> CollectionStats {
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    tracing::info!(
        instruments = instruments.len(),
        months = months.len(),
        out_dir = %out_dir.display(),
        "Close download started"
    );

    for (idx, instrument) in instruments.iter().enumerate() {
        stats.total += 1;

        tracing::debug!(
            instrument = %instrument,
            progress = format!("{}/{}", idx + 1, instruments.len()),
            "Instrument started"
        );

        let (series, report) = fetcher.fetch_months(instrument, months).await;
        stats.failed_months += report.failed_months().len();

        if series.is_empty() {
            stats.empty += 1;
            stats.failed_instruments.push(instrument.to_string());
            tracing::error!(
                instrument = %instrument,
                failed_months = report.failed_months().len(),
                empty_months = report.empty_months().len(),
                "No data fetched, skipping"
            );
            continue;
        }

        match write_series_csv(out_dir, &series) {
            Ok(path) => {
                stats.success += 1;
                stats.total_records += series.len();
                tracing::info!(
                    instrument = %instrument,
                    records = series.len(),
                    first = ?series.first_date(),
                    last = ?series.last_date(),
                    path = %path.display(),
                    "Instrument saved"
                );
            }
            Err(e) => {
                stats.errors += 1;
                stats.failed_instruments.push(instrument.to_string());
                tracing::error!(instrument = %instrument, error = %e, "CSV write failed");
            }
        }
    }

    stats.elapsed = start.elapsed();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use twse_data::{FetchConfig, FetchRequest, FetchResponse, TransportError};

    /// Serves fixed bodies keyed by `(stockNo, date)`; anything else fails.
    #[derive(Default)]
    struct FixedTransport {
        bodies: HashMap<(String, String), String>,
        calls: Mutex<usize>,
    }

    impl FixedTransport {
        fn with_rows(mut self, code: &str, month: MonthKey, rows: &[(&str, &str)]) -> Self {
            let data: Vec<Vec<&str>> = rows.iter().map(|(d, c)| vec![*d, *c]).collect();
            let body = json!({"stat": "OK", "fields": ["日期", "收盤價"], "data": data});
            self.bodies
                .insert((code.to_string(), month.request_date()), body.to_string());
            self
        }
    }

    #[async_trait]
    impl RequestTransport for FixedTransport {
        async fn fetch(
            &self,
            request: &FetchRequest,
        ) -> std::result::Result<FetchResponse, TransportError> {
            *self.calls.lock().unwrap() += 1;
            let key = (
                request.query_value("stockNo").unwrap_or_default().to_string(),
                request.query_value("date").unwrap_or_default().to_string(),
            );
            match self.bodies.get(&key) {
                Some(body) => Ok(FetchResponse::ok_json(body.clone())),
                None => Err(TransportError::Connect("connection refused".to_string())),
            }
        }
    }

    fn month(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    fn code(s: &str) -> InstrumentCode {
        InstrumentCode::new(s).unwrap()
    }

    fn fast_config() -> FetchConfig {
        FetchConfig {
            retry_delay: Duration::ZERO,
            month_delay: Duration::ZERO,
            ..FetchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_failed_instrument_does_not_stop_run() {
        let months = [month(2025, 7), month(2025, 8)];
        let transport = FixedTransport::default()
            .with_rows("0050", months[0], &[("114/07/01", "180.00")])
            .with_rows("0050", months[1], &[("114/08/01", "190.10")])
            .with_rows("00830", months[1], &[("114/08/01", "45.20")]);
        let fetcher = RangeFetcher::new(transport, fast_config());
        let out = tempfile::tempdir().unwrap();

        let instruments = [code("0050"), code("00670L"), code("00830")];
        let stats = collect_closes(&fetcher, &instruments, &months, out.path()).await;

        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.total_records, 3);
        // 00670L fails both months, 00830 fails July
        assert_eq!(stats.failed_months, 3);
        assert_eq!(stats.failed_instruments, vec!["00670L"]);

        assert!(out.path().join("0050.csv").exists());
        assert!(out.path().join("00830.csv").exists());
        assert!(!out.path().join("00670L.csv").exists());

        let text = std::fs::read_to_string(out.path().join("00830.csv")).unwrap();
        assert_eq!(text, "Date,Close\n2025-08-01,45.2\n");
    }

    #[tokio::test]
    async fn test_write_failure_is_counted() {
        let months = [month(2025, 8)];
        let transport =
            FixedTransport::default().with_rows("0050", months[0], &[("114/08/01", "190.10")]);
        let fetcher = RangeFetcher::new(transport, fast_config());

        // a regular file where the output directory should be
        let tmp = tempfile::tempdir().unwrap();
        let blocked = tmp.path().join("not-a-dir");
        std::fs::write(&blocked, b"x").unwrap();

        let stats = collect_closes(&fetcher, &[code("0050")], &months, &blocked).await;
        assert_eq!(stats.success, 0);
        assert_eq!(stats.errors, 1);
        assert!(stats.has_failures());
    }

    #[tokio::test]
    async fn test_no_instruments() {
        let fetcher = RangeFetcher::new(FixedTransport::default(), fast_config());
        let out = tempfile::tempdir().unwrap();

        let stats = collect_closes(&fetcher, &[], &[month(2025, 8)], out.path()).await;
        assert_eq!(stats.total, 0);
        assert!(!stats.has_failures());
        assert_eq!(*fetcher.transport().calls.lock().unwrap(), 0);
    }
}
