// Utility helpers for parsing and number formatting.
//
// All the "dirty" CSV cell handling lives here so the loader can assume
// clean, typed values once a cell has been coerced.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%m/%d/%Y %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators and leading currency symbols.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let s: String = s.chars().filter(|c| !matches!(c, ',' | '$' | '£' | '€')).collect();
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Dates come from several export tools, so try the known layouts in turn.
/// Plain dates are read as midnight.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// `$1,234.50`, with the sign ahead of the symbol.
pub fn format_currency(symbol: &str, n: f64, decimals: usize) -> String {
    let body = format_number(n.abs(), decimals);
    if n < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}{}", symbol, body)
    } else {
        format!("{}{}", symbol, body)
    }
}

/// `$120K`: the axis-label style used on revenue charts.
pub fn format_thousands(symbol: &str, n: f64) -> String {
    format_currency(symbol, n / 1000.0, 0) + "K"
}

/// Signed percentage, e.g. `+12.34%`.
pub fn format_change(pct: f64, decimals: usize) -> String {
    format!("{:+.*}%", decimals, pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_currency_and_separators() {
        assert_eq!(parse_f64_safe(Some(" $1,234.50 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("£7")), Some(7.0));
        assert_eq!(parse_f64_safe(Some("-3")), Some(-3.0));
        assert_eq!(parse_f64_safe(Some("NaN")), None);
        assert_eq!(parse_f64_safe(Some("12 units")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn parses_known_date_layouts() {
        let dt = parse_date_safe(Some("12/1/2010 8:26")).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2010-12-01 08:26");
        let d = parse_date_safe(Some("2018-11-23")).unwrap();
        assert_eq!(d.format("%Y-%m-%d %H:%M").to_string(), "2018-11-23 00:00");
        assert!(parse_date_safe(Some("yesterday")).is_none());
    }

    #[test]
    fn formats_numbers_with_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 0), "-1,500");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_currency("$", -42.5, 2), "-$42.50");
        assert_eq!(format_thousands("£", 120_400.0), "£120K");
        assert_eq!(format_change(31.456, 1), "+31.5%");
        assert_eq!(format_change(-4.0, 2), "-4.00%");
    }
}
