// Utility helpers for parsing and basic statistics.
//
// This module centralizes all the "dirty" cell/number/date handling so the
// rest of the code can assume clean, typed values.
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use num_format::{Locale, ToFormattedString};
use serde::Deserialize;

const DATETIME_FORMATS: [&str; 9] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Which character separates the integer and fractional digits of a value
/// cell. The other of `.`/`,` is treated as a thousands separator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalSeparator {
    #[default]
    Dot,
    Comma,
}

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace; empty means missing.
/// - Strips thousands separators, currency `$` and inner spaces.
/// - Accepts scientific notation (`1.5E+04`).
/// - Returns `None` for anything that cannot be parsed to a finite number,
///   which covers `NaN` and `inf`.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    parse_f64_with(s, DecimalSeparator::Dot)
}

/// [`parse_f64_safe`] for an explicit decimal separator.
pub fn parse_f64_with(s: Option<&str>, decimal: DecimalSeparator) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let (thousands, dec) = match decimal {
        DecimalSeparator::Dot => (',', '.'),
        DecimalSeparator::Comma => ('.', ','),
    };
    let cleaned: String = s
        .chars()
        .filter(|c| *c != thousands && !matches!(c, '$' | ' '))
        .map(|c| if c == dec { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a timestamp cell. Date-only values resolve to midnight.
pub fn parse_timestamp_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Trimmed categorical cell; blank cells are absent.
pub fn clean_label(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// English weekday name, independent of locale.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Unweighted arithmetic mean; `None` for an empty slice.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

/// Sample standard deviation (n - 1); undefined below two values.
pub fn sample_std(v: &[f64]) -> Option<f64> {
    if v.len() < 2 {
        return None;
    }
    let m = mean(v)?;
    let ss: f64 = v.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (v.len() - 1) as f64).sqrt())
}

/// Linear-interpolated quantile of an ascending-sorted slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators (`1,234,567.89`).
    // Digits are grouped as text so magnitudes beyond any integer type survive.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let mut res = group_digits(int_part, Locale::en.separator());
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

fn group_digits(digits: &str, separator: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * separator.len());
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
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

    #[test]
    fn test_parse_f64_safe_accepts_currency_and_separators() {
        assert_eq!(parse_f64_safe(Some(" $1,250.50 ")), Some(1250.5));
        assert_eq!(parse_f64_safe(Some("-3")), Some(-3.0));
    }

    #[test]
    fn test_parse_f64_safe_rejects_missing_and_text() {
        assert_eq!(parse_f64_safe(None), None);
        assert_eq!(parse_f64_safe(Some("  ")), None);
        assert_eq!(parse_f64_safe(Some("NaN")), None);
        assert_eq!(parse_f64_safe(Some("inf")), None);
        assert_eq!(parse_f64_safe(Some("-infinity")), None);
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(Some("12abc")), None);
    }

    #[test]
    fn test_parse_f64_safe_scientific_notation() {
        assert_eq!(parse_f64_safe(Some("1.5E+04")), Some(15000.0));
        assert_eq!(parse_f64_safe(Some("2.5e3")), Some(2500.0));
        assert_eq!(parse_f64_safe(Some("$1.2e-1")), Some(0.12));
    }

    #[test]
    fn test_parse_f64_with_decimal_comma() {
        let comma = DecimalSeparator::Comma;
        assert_eq!(parse_f64_with(Some("45.000"), comma), Some(45000.0));
        assert_eq!(parse_f64_with(Some("$ 1.234,5"), comma), Some(1234.5));
        assert_eq!(parse_f64_with(Some("12,75"), comma), Some(12.75));
        assert_eq!(parse_f64_with(Some("45.000"), DecimalSeparator::Dot), Some(45.0));
    }

    #[test]
    fn test_parse_timestamp_safe_formats() {
        let midnight = |y, m, d| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_time(NaiveTime::MIN)
        };
        assert_eq!(parse_timestamp_safe(Some("2024-01-05")), Some(midnight(2024, 1, 5)));
        assert_eq!(parse_timestamp_safe(Some("2024/01/05")), Some(midnight(2024, 1, 5)));
        assert_eq!(parse_timestamp_safe(Some("05/01/2024")), Some(midnight(2024, 1, 5)));
        let with_time = parse_timestamp_safe(Some("2024-01-05 14:30:00")).unwrap();
        assert_eq!(with_time.format("%H:%M").to_string(), "14:30");
        assert!(parse_timestamp_safe(Some("2024-01-05T08:00:00Z")).is_some());
    }

    #[test]
    fn test_parse_timestamp_safe_without_seconds() {
        let dt = parse_timestamp_safe(Some("2024-01-05 14:30")).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-05 14:30:00");
        assert!(parse_timestamp_safe(Some("2024-01-05T14:30")).is_some());
    }

    #[test]
    fn test_parse_timestamp_safe_fractional_seconds() {
        let dt = parse_timestamp_safe(Some("2024-01-05 14:30:00.250")).unwrap();
        assert_eq!(dt.format("%H:%M:%S%.3f").to_string(), "14:30:00.250");
        let t = parse_timestamp_safe(Some("2024-01-05T14:30:00.5")).unwrap();
        assert_eq!(t.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn test_parse_timestamp_safe_day_first_with_time() {
        let dt = parse_timestamp_safe(Some("05/01/2024 14:30:00")).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-05 14:30");
        let short = parse_timestamp_safe(Some("05/01/2024 14:30")).unwrap();
        assert_eq!(short, dt);
    }

    #[test]
    fn test_parse_timestamp_safe_rejects_garbage() {
        assert_eq!(parse_timestamp_safe(Some("bad-date")), None);
        assert_eq!(parse_timestamp_safe(Some("2024-02-30")), None);
        assert_eq!(parse_timestamp_safe(Some("")), None);
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label(Some("  Norte ")), Some("Norte".to_string()));
        assert_eq!(clean_label(Some("   ")), None);
        assert_eq!(clean_label(None), None);
    }

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[100.0, 200.0]), Some(150.0));
        assert_eq!(sample_std(&[1.0]), None);
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138089935299395).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_sorted_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&v, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&v, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&v, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&v, 1.0), Some(4.0));
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 2), "-1,500.00");
        assert_eq!(format_number(150.0, 0), "150");
        assert_eq!(format_int(9855_i64), "9,855");
    }

    #[test]
    fn test_format_number_beyond_i64_range() {
        assert_eq!(format_number(1e19, 2), "10,000,000,000,000,000,000.00");
        assert_eq!(format_number(-1e19, 0), "-10,000,000,000,000,000,000");
        assert_eq!(format_number(999.0, 1), "999.0");
        assert_eq!(format_number(0.5, 2), "0.50");
    }
}
