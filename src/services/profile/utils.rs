use chrono::{NaiveDate, NaiveDateTime};

use crate::models::Value;

const DATE_FORMATS: [&str; 5] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
];

/// Formats a count with `,` between groups of three digits.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Parses a date or date-time string in one of the common layouts.
pub fn parse_temporal(s: &str) -> Option<Value> {
    let s = s.trim();
    for format in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Value::DateTime(dt));
        }
    }
    for format in DATE_FORMATS.iter() {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return Some(Value::Date(d));
        }
    }
    None
}

pub fn is_date_string(s: &str) -> bool {
    parse_temporal(s).is_some()
}
