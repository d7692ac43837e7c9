use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, ParseError};

/// `start`/`end`フィールドのタイムスタンプ形式。
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// `--start`/`--end`オプションで指定する日付の形式。
pub const FILTER_DATE_FORMAT: &str = "%d-%m-%Y";

/// `DD-MM-YYYY HH:MM:SS`形式のタイムスタンプをパースする。
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}

/// フィルタ用の日付をパースする。
pub fn parse_filter_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, FILTER_DATE_FORMAT)
        .with_context(|| format!("Failed to parse date (expected DD-MM-YYYY): {}", s))
}

/// 指定された日付の00:00:00を返す。
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}
