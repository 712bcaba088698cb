//! Series persistence.
//!
//! - `close_csv`: one `Date,Close` CSV file per instrument

pub mod close_csv;
