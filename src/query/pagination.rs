use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Offset/limit window of a paginated execution, plus the counts recorded
/// while it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_total: Option<u64>,
}

impl Pagination {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            total: None,
            filtered_total: None,
        }
    }

    /// Build a window from untrusted input
    ///
    /// Invalid input degrades to defaults rather than clamping: a negative or
    /// non-numeric offset becomes 0, and a negative, non-numeric or over-max
    /// limit becomes `default_limit` (not `max_limit`).
    pub fn from_input(
        offset: Option<&Value>,
        limit: Option<&Value>,
        default_limit: u64,
        max_limit: u64,
    ) -> Self {
        let offset = offset
            .and_then(parse_int)
            .and_then(|offset| u64::try_from(offset).ok())
            .unwrap_or(0);

        let limit = limit
            .and_then(parse_int)
            .and_then(|limit| u64::try_from(limit).ok())
            .filter(|limit| *limit <= max_limit)
            .unwrap_or(default_limit);

        Self::new(offset, limit)
    }
}

/// Base-10 integer parsing with the leniency of query-string input:
/// leading whitespace and a sign are accepted, trailing garbage is ignored,
/// fractional numbers are truncated, anything without leading digits is absent.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(text) => parse_int_str(text),
        _ => None,
    }
}

fn parse_int_str(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let digits: &str = &digits[..digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len())];
    if digits.is_empty() {
        return None;
    }

    let magnitude = digits.bytes().fold(0i64, |acc, digit| {
        acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}
