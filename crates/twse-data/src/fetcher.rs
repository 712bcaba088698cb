//! Serial month-by-month range fetcher.
//!
//! Each month goes through up to `max_attempts` attempts. An attempt ends in
//! one of the [`AttemptOutcome`] states; anything but `Success` is followed by
//! the retry delay (when attempts remain). A decodable response ends the
//! month whether or not it produced rows. Months are separated by
//! `month_delay` so the exchange sees a bounded request rate.
//!
//! # Example
//!
//! ```rust,ignore
//! use twse_data::{FetchConfig, InstrumentCode, RangeFetcher, ReqwestTransport, TransportOptions};
//!
//! let transport = ReqwestTransport::new(TransportOptions::default())?;
//! let fetcher = RangeFetcher::new(transport, FetchConfig::default());
//! let series = fetcher.fetch_range(&InstrumentCode::new("0050")?, 10).await;
//! ```

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::calendar::month_keys;
use crate::error::TransportError;
use crate::model::{InstrumentCode, InstrumentSeries, MonthKey, PriceRecord};
use crate::provider::transport::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::provider::{
    parse_month_payload, FetchRequest, RawMonthPayload, RequestTransport, STOCK_DAY_URL,
};

/// Range fetch settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Report endpoint
    pub base_url: String,
    /// Attempts per month (at least one is always made)
    pub max_attempts: u32,
    /// Wait after a failed attempt before the next one
    pub retry_delay: Duration,
    /// Wait between two consecutive months
    pub month_delay: Duration,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: STOCK_DAY_URL.to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_millis(400),
            month_delay: Duration::from_millis(400),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Result of a single request attempt.
#[derive(Debug)]
enum AttemptOutcome {
    Success(RawMonthPayload),
    HttpError(u16),
    NetworkError(TransportError),
    MalformedBody(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => f.write_str("ok"),
            Self::HttpError(status) => write!(f, "HTTP {}", status),
            Self::NetworkError(e) => write!(f, "{}", e),
            Self::MalformedBody(e) => write!(f, "malformed body: {}", e),
        }
    }
}

/// Terminal state of one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthOutcome {
    /// Response parsed into at least one record
    WithData(usize),
    /// Response parsed but held no usable rows (holiday month, pre-listing, layout drift)
    Empty,
    /// Every attempt failed
    Failed { attempts: u32, last_error: String },
}

/// Per-month outcomes of a range fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeReport {
    pub instrument: InstrumentCode,
    pub months: Vec<(MonthKey, MonthOutcome)>,
}

impl RangeReport {
    fn new(instrument: InstrumentCode) -> Self {
        Self {
            instrument,
            months: Vec::new(),
        }
    }

    pub fn failed_months(&self) -> Vec<MonthKey> {
        self.months
            .iter()
            .filter(|(_, o)| matches!(o, MonthOutcome::Failed { .. }))
            .map(|(m, _)| *m)
            .collect()
    }

    pub fn empty_months(&self) -> Vec<MonthKey> {
        self.months
            .iter()
            .filter(|(_, o)| *o == MonthOutcome::Empty)
            .map(|(m, _)| *m)
            .collect()
    }

    pub fn months_with_data(&self) -> usize {
        self.months
            .iter()
            .filter(|(_, o)| matches!(o, MonthOutcome::WithData(_)))
            .count()
    }
}

/// Drives month enumeration, requests with retry, and parsing for one
/// instrument at a time.
pub struct RangeFetcher<T> {
    transport: T,
    config: FetchConfig,
}

impl<T: RequestTransport> RangeFetcher<T> {
    pub fn new(transport: T, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Request for one instrument/month report.
    pub fn month_request(&self, instrument: &InstrumentCode, month: MonthKey) -> FetchRequest {
        FetchRequest::get(&self.config.base_url)
            .with_query("response", "json")
            .with_query("date", month.request_date())
            .with_query("stockNo", instrument.as_str())
            .with_header("User-Agent", &self.config.user_agent)
            .with_timeout(self.config.timeout)
    }

    /// Full lookback window ending this month.
    pub async fn fetch_range(&self, instrument: &InstrumentCode, years: u32) -> InstrumentSeries {
        self.fetch_range_with_report(instrument, years).await.0
    }

    /// Like [`fetch_range`](Self::fetch_range), also returning per-month outcomes.
    pub async fn fetch_range_with_report(
        &self,
        instrument: &InstrumentCode,
        years: u32,
    ) -> (InstrumentSeries, RangeReport) {
        let months = month_keys(years);
        self.fetch_months(instrument, &months).await
    }

    /// Fetch the given months in order and merge them into one series.
    pub async fn fetch_months(
        &self,
        instrument: &InstrumentCode,
        months: &[MonthKey],
    ) -> (InstrumentSeries, RangeReport) {
        let mut report = RangeReport::new(instrument.clone());
        let mut collected: Vec<PriceRecord> = Vec::new();

        info!(
            instrument = %instrument,
            months = months.len(),
            first = ?months.first().map(|m| m.to_string()),
            last = ?months.last().map(|m| m.to_string()),
            "Range fetch started"
        );

        for (idx, month) in months.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.config.month_delay).await;
            }

            let (outcome, records) = self.fetch_month(instrument, *month).await;
            collected.extend(records);
            report.months.push((*month, outcome));
        }

        let series = if collected.is_empty() {
            InstrumentSeries::empty(instrument.clone())
        } else {
            InstrumentSeries::from_records(instrument.clone(), collected)
        };

        info!(
            instrument = %instrument,
            records = series.len(),
            months_with_data = report.months_with_data(),
            failed_months = report.failed_months().len(),
            "Range fetch finished"
        );

        (series, report)
    }

    /// One month with bounded retries.
    pub async fn fetch_month(
        &self,
        instrument: &InstrumentCode,
        month: MonthKey,
    ) -> (MonthOutcome, Vec<PriceRecord>) {
        let request = self.month_request(instrument, month);
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(&request).await {
                AttemptOutcome::Success(payload) => {
                    let records = parse_month_payload(&payload);
                    if records.is_empty() {
                        debug!(
                            instrument = %instrument,
                            month = %month,
                            stat = payload.stat().unwrap_or_default(),
                            "No rows for month"
                        );
                        return (MonthOutcome::Empty, records);
                    }

                    debug!(
                        instrument = %instrument,
                        month = %month,
                        records = records.len(),
                        "Month fetched"
                    );
                    return (MonthOutcome::WithData(records.len()), records);
                }
                failure => {
                    last_error = failure.to_string();
                    debug!(
                        instrument = %instrument,
                        month = %month,
                        attempt = attempt,
                        error = %last_error,
                        "Attempt failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        warn!(
            instrument = %instrument,
            month = %month,
            attempts = max_attempts,
            error = %last_error,
            "Month download failed, skipping"
        );

        (
            MonthOutcome::Failed {
                attempts: max_attempts,
                last_error,
            },
            Vec::new(),
        )
    }

    async fn attempt(&self, request: &FetchRequest) -> AttemptOutcome {
        let response = match self.transport.fetch(request).await {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::NetworkError(e),
        };

        if !response.is_success() {
            return AttemptOutcome::HttpError(response.status);
        }

        match RawMonthPayload::from_body(&response.body) {
            Ok(payload) => AttemptOutcome::Success(payload),
            Err(e) => AttemptOutcome::MalformedBody(e.to_string()),
        }
    }
}
