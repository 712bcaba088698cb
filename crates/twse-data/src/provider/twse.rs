//! TWSE `STOCK_DAY` monthly report decoding.
//!
//! The report is `{"stat": ..., "fields": [...], "data": [[...], ...]}` with
//! Chinese column names. Column positions have moved over time, so columns
//! are located by name. A layout problem empties the month; a bad cell drops
//! only its row.

use rust_decimal::Decimal;
use serde_json::Value;
use std::borrow::Cow;
use std::str::FromStr;

use crate::calendar::parse_roc_date;
use crate::model::PriceRecord;

/// Monthly per-instrument daily trading report.
pub const STOCK_DAY_URL: &str = "https://www.twse.com.tw/exchangeReport/STOCK_DAY";

/// Date column name (日期).
pub const DATE_FIELD: &str = "日期";
/// Closing price column name (收盤價).
pub const CLOSE_FIELD: &str = "收盤價";

/// One decoded month report, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMonthPayload(Value);

impl RawMonthPayload {
    /// Decode a response body. Anything that is valid JSON is accepted here;
    /// structural checks belong to [`parse_month_payload`].
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body).map(Self)
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Report status text (`OK`, or a "no data" message).
    pub fn stat(&self) -> Option<&str> {
        self.0.get("stat").and_then(Value::as_str)
    }

    fn fields(&self) -> Option<&Vec<Value>> {
        self.0.get("fields").and_then(Value::as_array)
    }

    fn rows(&self) -> Option<&Vec<Value>> {
        self.0.get("data").and_then(Value::as_array)
    }
}

/// Normalize one month report into price records, in source row order.
pub fn parse_month_payload(payload: &RawMonthPayload) -> Vec<PriceRecord> {
    let (fields, rows) = match (payload.fields(), payload.rows()) {
        (Some(fields), Some(rows)) if !rows.is_empty() => (fields, rows),
        _ => return Vec::new(),
    };

    let (date_idx, close_idx) = match (
        column_index(fields, DATE_FIELD),
        column_index(fields, CLOSE_FIELD),
    ) {
        (Some(d), Some(c)) => (d, c),
        _ => return Vec::new(),
    };

    rows.iter()
        .filter_map(|row| parse_row(row, date_idx, close_idx))
        .collect()
}

fn column_index(fields: &[Value], name: &str) -> Option<usize> {
    fields.iter().position(|f| f.as_str() == Some(name))
}

fn parse_row(row: &Value, date_idx: usize, close_idx: usize) -> Option<PriceRecord> {
    let cells = row.as_array()?;
    let date = parse_roc_date(&cell_text(cells.get(date_idx)?)?)?;
    let close = parse_close_cell(&cell_text(cells.get(close_idx)?)?)?;
    Some(PriceRecord::new(date, close))
}

fn cell_text(cell: &Value) -> Option<Cow<'_, str>> {
    match cell {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        _ => None,
    }
}

/// Parse a closing-price cell such as `"1,234.50"` or `"124.50*"`.
///
/// Thousands separators are dropped, then every character other than a
/// digit, `.` or `-` (annotation marks). Placeholders like `--` and negative
/// values yield `None`.
pub fn parse_close_cell(cell: &str) -> Option<Decimal> {
    let cleaned: String = cell
        .replace(',', "")
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let value = Decimal::from_str(&cleaned).ok()?;
    (value >= Decimal::ZERO).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report(rows: Value) -> RawMonthPayload {
        RawMonthPayload::from_value(json!({
            "stat": "OK",
            "date": "20250801",
            "title": "114年08月 0050 元大台灣50 各日成交資訊",
            "fields": ["日期", "成交股數", "成交金額", "開盤價", "最高價", "最低價", "收盤價", "漲跌價差", "成交筆數"],
            "data": rows,
        }))
    }

    #[test]
    fn test_parse_close_cell() {
        assert_eq!(parse_close_cell("124.50*"), Some(dec!(124.50)));
        assert_eq!(parse_close_cell("1,234.5"), Some(dec!(1234.5)));
        assert_eq!(parse_close_cell(" 98.7 "), Some(dec!(98.7)));
        assert_eq!(parse_close_cell("X12.00"), Some(dec!(12.00)));
        assert_eq!(parse_close_cell("--"), None);
        assert_eq!(parse_close_cell(""), None);
        assert_eq!(parse_close_cell("xx"), None);
        assert_eq!(parse_close_cell("-3.5"), None);
    }

    #[test]
    fn test_full_row_layout() {
        let payload = report(json!([
            ["114/08/07", "5,432,100", "674,123,456", "124.00", "125.10", "123.90", "124.50", "+0.35", "4,321"],
            ["114/08/08", "4,000,000", "500,000,000", "124.50", "125.50", "124.00", "125.00", "+0.50", "3,900"],
        ]));

        let records = parse_month_payload(&payload);
        assert_eq!(
            records,
            vec![
                PriceRecord::new(date(2025, 8, 7), dec!(124.50)),
                PriceRecord::new(date(2025, 8, 8), dec!(125.00)),
            ]
        );
    }

    #[test]
    fn test_bad_row_is_dropped_alone() {
        let payload = RawMonthPayload::from_value(json!({
            "fields": ["日期", "收盤價"],
            "data": [["114/08/07", "124.50"], ["bad", "xx"], ["114/08/08", "125.00"]],
        }));

        let records = parse_month_payload(&payload);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, date(2025, 8, 7));
        assert_eq!(records[1].date, date(2025, 8, 8));
    }

    #[test]
    fn test_rows_keep_source_order() {
        let payload = RawMonthPayload::from_value(json!({
            "fields": ["日期", "收盤價"],
            "data": [["114/08/08", "125.00"], ["114/08/07", "124.50"]],
        }));

        let dates: Vec<NaiveDate> = parse_month_payload(&payload).iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2025, 8, 8), date(2025, 8, 7)]);
    }

    #[test]
    fn test_columns_found_by_name_after_reorder() {
        let payload = RawMonthPayload::from_value(json!({
            "fields": ["成交筆數", "收盤價", "開盤價", "日期"],
            "data": [["1,000", "50.10", "49.90", "113/12/31"]],
        }));

        assert_eq!(
            parse_month_payload(&payload),
            vec![PriceRecord::new(date(2024, 12, 31), dec!(50.10))]
        );
    }

    #[test]
    fn test_numeric_cells_and_short_rows() {
        let payload = RawMonthPayload::from_value(json!({
            "fields": ["日期", "收盤價"],
            "data": [["114/01/02", 187.5], ["114/01/03"], "not-a-row", ["114/01/06", null]],
        }));

        assert_eq!(
            parse_month_payload(&payload),
            vec![PriceRecord::new(date(2025, 1, 2), dec!(187.5))]
        );
    }

    #[test]
    fn test_layout_problems_yield_empty() {
        let no_data = RawMonthPayload::from_value(json!({"stat": "很抱歉，沒有符合條件的資料!"}));
        assert!(parse_month_payload(&no_data).is_empty());
        assert_eq!(no_data.stat(), Some("很抱歉，沒有符合條件的資料!"));

        let empty_rows = report(json!([]));
        assert!(parse_month_payload(&empty_rows).is_empty());

        let missing_fields = RawMonthPayload::from_value(json!({
            "data": [["114/08/07", "124.50"]],
        }));
        assert!(parse_month_payload(&missing_fields).is_empty());

        let renamed_close = RawMonthPayload::from_value(json!({
            "fields": ["日期", "收盤價(元)"],
            "data": [["114/08/07", "124.50"]],
        }));
        assert!(parse_month_payload(&renamed_close).is_empty());

        let not_an_object = RawMonthPayload::from_value(json!([1, 2, 3]));
        assert!(parse_month_payload(&not_an_object).is_empty());
    }

    #[test]
    fn test_parse_is_repeatable() {
        let payload = report(json!([
            ["114/08/07", "1", "1", "1", "1", "1", "124.50*", "0", "1"],
            ["114/08/08", "1", "1", "1", "1", "1", "--", "0", "1"],
        ]));

        let first = parse_month_payload(&payload);
        let second = parse_month_payload(&payload);
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_from_body_requires_json() {
        assert!(RawMonthPayload::from_body("<html>blocked</html>").is_err());
        let payload = RawMonthPayload::from_body(r#"{"stat":"OK","fields":[],"data":[]}"#).unwrap();
        assert_eq!(payload.stat(), Some("OK"));
    }
}
