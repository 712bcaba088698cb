//! Data provider module.
//!
//! ## Transport
//! - `RequestTransport`: single GET with status passthrough
//! - `FallbackTransport`: strict sender with a one-shot insecure retry on
//!   certificate failures, over any `HttpSend`
//! - `ReqwestTransport`: `FallbackTransport` over two rustls clients
//!   (verification on / off); see `TransportOptions`
//!
//! ## TWSE monthly report
//! - `RawMonthPayload`: decoded `STOCK_DAY` JSON document
//! - `parse_month_payload`: column lookup by name, row-tolerant decoding

pub mod transport;
pub mod twse;

pub use transport::{
    FallbackTransport, FetchRequest, FetchResponse, HttpSend, ReqwestTransport, RequestTransport,
    TransportOptions,
};
pub use twse::{parse_close_cell, parse_month_payload, RawMonthPayload, STOCK_DAY_URL};
