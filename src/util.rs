// Utility helpers for parsing and basic statistics.
//
// All the "dirty" CSV text handling lives here so the rest of the crate can
// assume clean, typed values.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Day-first formats used by the ticketing exports, then ISO fallbacks.
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

/// Parse a timestamp cell, accepting both full timestamps and bare dates.
///
/// Bare dates land at midnight. Returns `None` for anything else so the loader
/// can drop the row instead of coercing it to a default date.
pub fn parse_timestamp_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    // Fractional seconds show up in some exports; they never matter for daily counts.
    let s = s.split('.').next().unwrap_or(s);
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Trimmed, non-empty text or `None`.
pub fn clean_text(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Comparison key for categorical labels: trimmed and upper-cased.
pub fn label_key(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Every calendar date in `[start, end]`; empty when `start > end`.
pub fn date_span(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start.iter_days().take_while(|d| *d <= end).collect()
}

pub fn average(v: &[f64]) -> f64 {
    // Arithmetic mean; 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Round a non-negative expected count to an integer, ties to even.
pub fn round_count(v: f64) -> u64 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    v.round_ties_even() as u64
}

/// `part / whole * 100`, or 0 when `whole` is zero.
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    let pct = part / whole * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Fixed decimals with `en` thousands separators, e.g. `1,234,567.89`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let unit = 10u64.saturating_pow(decimals as u32);
    let scaled = (n.abs() * unit as f64).round() as u64;
    let sign = if n < 0.0 && scaled != 0 { "-" } else { "" };
    let whole = (scaled / unit).to_formatted_string(&Locale::en);
    if decimals == 0 {
        format!("{}{}", sign, whole)
    } else {
        format!("{}{}.{:0width$}", sign, whole, scaled % unit, width = decimals)
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_day_first_timestamps() {
        let ts = parse_timestamp_safe(Some(" 03/02/2026 14:05:09 ")).unwrap();
        assert_eq!(ts.date(), ymd(2026, 2, 3));
        assert_eq!(ts.format("%H:%M:%S").to_string(), "14:05:09");
    }

    #[test]
    fn parses_bare_and_iso_dates() {
        assert_eq!(parse_timestamp_safe(Some("03/02/2026")).unwrap().date(), ymd(2026, 2, 3));
        assert_eq!(
            parse_timestamp_safe(Some("2026-02-03T08:00:00.123")).unwrap().date(),
            ymd(2026, 2, 3)
        );
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp_safe(None).is_none());
        assert!(parse_timestamp_safe(Some("   ")).is_none());
        assert!(parse_timestamp_safe(Some("31/02/2026")).is_none());
        assert!(parse_timestamp_safe(Some("yesterday")).is_none());
    }

    #[test]
    fn label_key_ignores_case_and_padding() {
        assert_eq!(label_key("sumaré "), label_key("SUMARÉ"));
    }

    #[test]
    fn round_count_uses_ties_to_even() {
        assert_eq!(round_count(2.5), 2);
        assert_eq!(round_count(3.5), 4);
        assert_eq!(round_count(3.49), 3);
        assert_eq!(round_count(-1.0), 0);
        assert_eq!(round_count(f64::NAN), 0);
    }

    #[test]
    fn date_span_is_inclusive() {
        let span = date_span(ymd(2026, 1, 30), ymd(2026, 2, 2));
        assert_eq!(span.len(), 4);
        assert!(date_span(ymd(2026, 2, 2), ymd(2026, 1, 30)).is_empty());
    }

    #[test]
    fn percent_guards_zero_denominator() {
        assert_eq!(percent(7.0, 0.0), 0.0);
        assert_eq!(percent(1.0, 4.0), 25.0);
    }

    #[test]
    fn formats_thousands() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-12.0, 1), "-12.0");
        assert_eq!(format_number(-0.01, 1), "0.0");
        assert_eq!(format_number(80.0, 0), "80");
        assert_eq!(format_number(0.05, 2), "0.05");
        assert_eq!(format_int(9855), "9,855");
    }
}
