//! Timestamp canonicalization.
//!
//! Sources hand back timestamps in whatever shape their driver or locale
//! prefers. Output files use one of two fixed shapes.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 出力ファイルに書く正規化済みの文字列形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// `2025-03-07T14:05:09`
    IsoSeconds,
    /// `07/03/2025`
    DayMonthYear,
}

impl TimestampFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            TimestampFormat::IsoSeconds => "%Y-%m-%dT%H:%M:%S",
            TimestampFormat::DayMonthYear => "%d/%m/%Y",
        }
    }

    pub fn format(self, ts: NaiveDateTime) -> String {
        ts.format(self.pattern()).to_string()
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"];

/// Parse a source timestamp. Offsets are honoured by keeping the wall-clock
/// time in that offset; slash and dot dates are day-first.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Some(ts) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
    {
        return Some(ts);
    }
    if let Some(ts) = OFFSET_DATETIME_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(raw, f).ok())
    {
        return Some(ts.naive_local());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// フィールド値の正規化文字列（解釈できなければ `""`）
pub fn canonicalize(value: &Value, format: TimestampFormat) -> Value {
    let text = match value {
        Value::String(s) => parse_timestamp(s).map(|ts| format.format(ts)),
        _ => None,
    };
    Value::String(text.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("2025-03-07T14:05:09", "2025-03-07T14:05:09")]
    #[case("2025-03-07T14:05:09.123456", "2025-03-07T14:05:09")]
    #[case("2025-03-07 14:05:09", "2025-03-07T14:05:09")]
    #[case("2025-03-07 14:05:09.5+01", "2025-03-07T14:05:09")]
    #[case("2025-03-07T14:05:09Z", "2025-03-07T14:05:09")]
    #[case("2025-03-07T14:05:09+02:00", "2025-03-07T14:05:09")]
    #[case("2025-03-07", "2025-03-07T00:00:00")]
    #[case("07/03/2025 08:30", "2025-03-07T08:30:00")]
    #[case("07.03.2025", "2025-03-07T00:00:00")]
    fn iso_seconds(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(canonicalize(&json!(raw), TimestampFormat::IsoSeconds), json!(expected));
    }

    #[rstest]
    #[case("2025-03-07T14:05:09", "07/03/2025")]
    #[case("2025-12-31", "31/12/2025")]
    #[case("31/12/2025", "31/12/2025")]
    fn day_month_year(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(canonicalize(&json!(raw), TimestampFormat::DayMonthYear), json!(expected));
    }

    #[rstest]
    #[case(json!("not a date"))]
    #[case(json!(""))]
    #[case(json!("2025-13-40"))]
    #[case(json!(null))]
    #[case(json!(1741356309))]
    fn unparseable_becomes_empty(#[case] value: Value) {
        assert_eq!(canonicalize(&value, TimestampFormat::IsoSeconds), json!(""));
    }

    #[rstest]
    #[case(TimestampFormat::IsoSeconds)]
    #[case(TimestampFormat::DayMonthYear)]
    fn canonicalization_is_idempotent(#[case] format: TimestampFormat) {
        for raw in ["2025-03-07T14:05:09.9", "2024-02-29", "01/01/2025 00:00:01"] {
            let once = canonicalize(&json!(raw), format);
            let twice = canonicalize(&once, format);
            assert_eq!(once, twice, "{raw}");
        }
    }
}
