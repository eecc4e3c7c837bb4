use std::{fmt, sync::OnceLock};

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Serialize, Serializer};

/// Tokens treated as a missing cell when a raw table is loaded.
pub const DEFAULT_MISSING_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
];

/// A typed cell in a canonical table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
        }
    }
}

/// Case-folds a column name for comparison against registry names.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Folds every non-alphanumeric character to `_` and lowercases the rest, so
/// `Release Year` and `release-year` both become `release_year`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn is_missing_token(value: &str, tokens: &[String]) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || tokens.iter().any(|token| token == trimmed)
}

fn thousands_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("thousands pattern is valid")
    })
}

/// Parses a numeric cell, accepting comma thousands separators. Non-finite
/// results count as unparseable.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = match trimmed.parse::<f64>() {
        Ok(value) => value,
        Err(_) if thousands_pattern().is_match(trimmed) => {
            trimmed.replace(',', "").parse::<f64>().ok()?
        }
        Err(_) => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Rounds half away from zero; values outside the `i64` range are rejected.
pub fn round_to_integer(value: f64) -> Option<i64> {
    let rounded = value.round();
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded <= i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        None
    }
}

pub fn parse_integer(raw: &str) -> Option<i64> {
    parse_number(raw).and_then(round_to_integer)
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

/// Extracts a calendar year from a bare number (`2010`, `2010.0`) or a date
/// string (`2010-07-16`, `2010-07-16T00:00:00`).
pub fn parse_year(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Some(year) = parse_integer(trimmed) {
        return Some(year);
    }
    if let Ok(date) = parse_naive_date(trimmed) {
        return Some(i64::from(date.year()));
    }
    trimmed
        .get(..10)
        .and_then(|prefix| parse_naive_date(prefix).ok())
        .map(|date| i64::from(date.year()))
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_column_name_folds_punctuation_and_case() {
        assert_eq!(normalize_column_name("Release Year"), "release_year");
        assert_eq!(normalize_column_name("IMDB-Score"), "imdb_score");
        assert_eq!(normalize_column_name("  Title "), "title");
    }

    #[test]
    fn parse_number_accepts_thousands_separators() {
        assert_eq!(parse_number("1,234,567"), Some(1_234_567.0));
        assert_eq!(parse_number(" 7.5 "), Some(7.5));
        assert_eq!(parse_number("12,34"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("seven"), None);
    }

    #[test]
    fn parse_integer_rounds_half_away_from_zero() {
        assert_eq!(parse_integer("120.0"), Some(120));
        assert_eq!(parse_integer("92.5"), Some(93));
        assert_eq!(parse_integer("-2.5"), Some(-3));
        assert_eq!(parse_integer("1e30"), None);
    }

    #[test]
    fn parse_year_reads_numbers_and_dates() {
        assert_eq!(parse_year("1999"), Some(1999));
        assert_eq!(parse_year("2010-07-16"), Some(2010));
        assert_eq!(parse_year("16/07/2010"), Some(2010));
        assert_eq!(parse_year("2010-07-16T00:00:00"), Some(2010));
        assert_eq!(parse_year("sometime"), None);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn missing_tokens_match_after_trimming() {
        let tokens = vec!["NA".to_string(), "null".to_string()];
        assert!(is_missing_token("  ", &tokens));
        assert!(is_missing_token(" NA ", &tokens));
        assert!(!is_missing_token("na", &tokens));
        assert!(!is_missing_token("Drama", &tokens));
    }

    #[test]
    fn real_values_keep_a_decimal_point() {
        assert_eq!(Value::Real(8.0).as_display(), "8.0");
        assert_eq!(Value::Real(7.25).as_display(), "7.25");
        assert_eq!(Value::Integer(42).as_display(), "42");
    }
}
