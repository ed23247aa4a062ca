//! Value and column-name patterns shared by inference and validation.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

/// Column-name fragments that suggest a date/time column.
pub const DATE_KEYWORDS: &[&str] = &[
    "date", "time", "timestamp", "day", "month", "year", "created", "updated", "_at", "period",
];

/// Column-name fragments that suggest a measure.
pub const NUMERIC_KEYWORDS: &[&str] = &[
    "amount", "price", "cost", "revenue", "total", "sum", "count", "qty", "quantity", "value",
    "score", "rate", "sales", "profit", "balance", "fee", "volume", "weight",
];

/// Column-name fragments that suggest a categorical attribute.
pub const DIMENSION_KEYWORDS: &[&str] = &[
    "id", "name", "category", "type", "region", "country", "city", "state", "status", "code",
    "group", "segment", "channel", "product", "customer", "brand",
];

/// Tokens accepted as booleans (compared case-insensitively).
pub const BOOLEAN_TOKENS: &[&str] = &["true", "false", "1", "0", "yes", "no"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("numeric literal pattern is valid")
});

static INTEGRAL_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("integral literal pattern is valid"));

/// Case-insensitive substring match of a column name against a vocabulary.
pub fn name_matches(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Strip thousands separators and quoting before numeric matching.
pub fn strip_numeric_noise(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '"' | '\''))
        .collect()
}

pub fn is_numeric_literal(raw: &str) -> bool {
    NUMERIC_LITERAL.is_match(&strip_numeric_noise(raw))
}

pub fn is_integral_literal(raw: &str) -> bool {
    INTEGRAL_LITERAL.is_match(&strip_numeric_noise(raw))
}

pub fn is_boolean_token(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    BOOLEAN_TOKENS.contains(&lower.as_str())
}

/// True if `raw` parses as a date or date-time with one of the fixed formats (or RFC 3339).
pub fn parses_as_date(raw: &str) -> bool {
    let s = raw.trim();
    if s.is_empty() {
        return false;
    }
    DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(s, f).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
        || DateTime::parse_from_rfc3339(s).is_ok()
}

/// Share of `values` matching `pred`, as an exact `matched * 100 >= threshold * total` test.
pub fn share_at_least<'a>(
    values: impl IntoIterator<Item = &'a str>,
    threshold_pct: usize,
    pred: impl Fn(&str) -> bool,
) -> bool {
    let (mut total, mut matched) = (0usize, 0usize);
    for v in values {
        total += 1;
        if pred(v) {
            matched += 1;
        }
    }
    total > 0 && matched * 100 >= threshold_pct * total
}
