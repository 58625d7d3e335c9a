// 🔢 Numeric Parser - locale-agnostic amount parsing
// Output of record: must be bit-exact, never panics, never errors.
//
// Handles:
//   - unicode spaces as thousands separators (NBSP, narrow NBSP, thin, figure)
//   - unicode minus / en-dash / em-dash
//   - parenthesized negatives: (42 653) -> -42653
//   - decimal separator = right-most of '.' and ','

use crate::grid::Cell;
use once_cell::sync::Lazy;
use regex::Regex;

static PLAIN_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("valid integer pattern"));

static MIXED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[\d.,]+$").expect("valid mixed number pattern"));

/// Whitespace characters stripped before parsing (word joiner is not `is_whitespace`)
fn is_number_space(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{00a0}' | '\u{202f}' | '\u{2009}' | '\u{2007}' | '\u{2060}')
}

/// Parse one grid cell into an amount. `None` means "not a number".
pub fn parse_amount(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => None,
        Cell::Number(v) => v.is_finite().then_some(*v),
        Cell::Text(s) => parse_amount_str(s),
    }
}

/// Parse a raw text value into an amount. `None` means "not a number".
pub fn parse_amount_str(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }

    let mut s: String = s
        .chars()
        .map(|c| match c {
            '−' | '–' | '—' => '-',
            other => other,
        })
        .collect();

    if s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
        s = format!("-{}", &s[1..s.len() - 1]);
    }

    let s: String = s.chars().filter(|c| !is_number_space(*c)).collect();
    if s.is_empty() {
        return None;
    }

    if PLAIN_INTEGER.is_match(&s) {
        return finite(s.parse::<f64>().ok());
    }

    if !MIXED_NUMBER.is_match(&s) {
        // scientific notation and friends; "nan"/"inf" are rejected by finite()
        return finite(s.parse::<f64>().ok());
    }

    let (decimal, thousands) = if s.rfind('.') > s.rfind(',') {
        ('.', ',')
    } else {
        (',', '.')
    };

    let cleaned: String = s
        .chars()
        .filter(|c| *c != thousands)
        .map(|c| if c == decimal { '.' } else { c })
        .collect();

    finite(cleaned.parse::<f64>().ok())
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Render an amount for CSV output.
///
/// Integral values have no decimal point; fractions use the shortest text
/// that parses back to the same `f64`. Never uses scientific notation.
pub fn format_plain(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 {
        return format!("{:.0}", value);
    }
    format!("{}", value)
}

/// `format_plain` for optional values; `None` renders empty
pub fn format_opt(value: Option<f64>) -> String {
    value.map(format_plain).unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_required_edge_cases() {
        assert_eq!(parse_amount(&text("42\u{00a0}653")), Some(42653.0));
        assert_eq!(parse_amount(&text("(1,234.50)")), Some(-1234.5));
        assert_eq!(parse_amount(&text("1.234,56")), Some(1234.56));
        assert_eq!(parse_amount(&text("1,234.56")), Some(1234.56));
        assert_eq!(parse_amount(&text("−5")), Some(-5.0));
        assert_eq!(parse_amount(&text("")), None);
    }

    #[test]
    fn test_parenthesized_with_nbsp_and_decimal_comma() {
        assert_eq!(parse_amount_str("(42 653,10)"), Some(-42653.10));
        assert_eq!(parse_amount_str("(42\u{202f}653,10)"), Some(-42653.10));
    }

    #[test]
    fn test_minus_variants() {
        assert_eq!(parse_amount_str("–12"), Some(-12.0));
        assert_eq!(parse_amount_str("—12,5"), Some(-12.5));
        assert_eq!(parse_amount_str("-"), None);
        assert_eq!(parse_amount_str(" − "), None);
    }

    #[test]
    fn test_unicode_spaces_stripped() {
        assert_eq!(parse_amount_str("1\u{2009}000\u{2007}000"), Some(1_000_000.0));
        assert_eq!(parse_amount_str("12\u{2060}345"), Some(12345.0));
        assert_eq!(parse_amount_str("  7 500  "), Some(7500.0));
    }

    #[test]
    fn test_rightmost_separator_is_decimal() {
        assert_eq!(parse_amount_str("1,5"), Some(1.5));
        assert_eq!(parse_amount_str("1.5"), Some(1.5));
        assert_eq!(parse_amount_str("1.234.567,8"), Some(1234567.8));
        assert_eq!(parse_amount_str("1,234,567.8"), Some(1234567.8));
    }

    #[test]
    fn test_garbage_is_not_a_number() {
        assert_eq!(parse_amount_str("n/a"), None);
        assert_eq!(parse_amount_str("nan"), None);
        assert_eq!(parse_amount_str("inf"), None);
        assert_eq!(parse_amount_str("1.2.3"), None);
        assert_eq!(parse_amount_str("Cəmi"), None);
        assert_eq!(parse_amount_str("()"), None);
    }

    #[test]
    fn test_scientific_notation_falls_back_to_plain_parse() {
        assert_eq!(parse_amount_str("1e3"), Some(1000.0));
    }

    #[test]
    fn test_numeric_cells() {
        assert_eq!(parse_amount(&Cell::Number(12.5)), Some(12.5));
        assert_eq!(parse_amount(&Cell::Number(f64::NAN)), None);
        assert_eq!(parse_amount(&Cell::Empty), None);
    }

    #[test]
    fn test_format_plain() {
        assert_eq!(format_plain(1234.0), "1234");
        assert_eq!(format_plain(-1234.0), "-1234");
        assert_eq!(format_plain(1234.5), "1234.5");
        assert_eq!(format_plain(0.000123), "0.000123");
        assert_eq!(format_plain(123456789012.0), "123456789012");
        assert_eq!(format_plain(-0.0), "0");
        assert_eq!(format_opt(None), "");
        assert!(!format_plain(1.0e15).contains('e'));
        assert_eq!(format_plain(1.23456e-7), "0.000000123456");
        assert_eq!(format_plain(5e-10), "0.0000000005");
    }

    #[test]
    fn test_format_then_parse_round_trip() {
        let values = [
            0.0, 1.0, -1.0, 1234.0, 1234.5, -42653.1, 0.5, 0.001234, 123456.0, -99.9999,
            654321000.0, 3.14159, 0.000001, -0.25, 1.23456e-7, 5e-10, 1234.000001,
        ];
        for v in values {
            let rendered = format_plain(v);
            assert_eq!(parse_amount_str(&rendered), Some(v), "round trip failed for {}", rendered);
        }
    }
}
