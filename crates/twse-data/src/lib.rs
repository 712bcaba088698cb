//! TWSE daily closing-price data.
//!
//! This crate provides:
//! - the domain model (instrument codes, month keys, price records, series)
//! - ROC-calendar conversion and month-window enumeration
//! - the TWSE `STOCK_DAY` transport and tolerant payload parser
//! - a serial, paced range fetcher with bounded retries
//! - `Date,Close` CSV storage

pub mod calendar;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result, TransportError};
pub use fetcher::{FetchConfig, MonthOutcome, RangeFetcher, RangeReport};
pub use model::{InstrumentCode, InstrumentSeries, MonthKey, PriceRecord};

// Provider re-exports
pub use provider::{
    parse_month_payload, FallbackTransport, FetchRequest, FetchResponse, HttpSend, RawMonthPayload,
    ReqwestTransport, RequestTransport, TransportOptions,
};

// Storage re-exports
pub use storage::close_csv::{series_to_csv_string, write_series_csv};
