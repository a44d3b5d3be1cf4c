//! Raw string to typed value coercion. Nothing here fails: malformed input is absent.

use std::sync::LazyLock;

use regex::Regex;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("digit regex must compile"));

const CURRENCY_SYMBOLS: [char; 5] = ['$', '£', '€', '¥', '¢'];

/// Parse a decimal, tolerating thousands separators and surrounding currency symbols.
pub fn to_decimal(text: &str) -> Option<f64> {
    let trimmed = text
        .trim()
        .trim_matches(|c: char| c.is_whitespace() || CURRENCY_SYMBOLS.contains(&c));
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = trimmed.replace(',', "");
    let value = cleaned.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Parse a whole number, tolerating thousands separators.
pub fn to_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', "").parse::<i64>().ok()
}

pub fn to_clean_string(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Collapse internal whitespace runs (newlines, nbsp, tabs) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First run of digits in the text, e.g. "Box of 20" -> 20, "1,204 Reviews" -> 1204.
pub fn first_integer(text: &str) -> Option<i64> {
    let digits = DIGIT_RUN.find(text)?.as_str().replace(',', "");
    digits.parse::<i64>().ok()
}

pub(crate) fn non_negative_decimal(text: &str) -> Option<f64> {
    to_decimal(text).filter(|v| *v >= 0.0)
}

pub(crate) fn count(text: &str) -> Option<u32> {
    to_integer(text)
        .or_else(|| first_integer(text))
        .and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimals_accept_currency_and_separators() {
        assert_eq!(to_decimal("$1,234.50"), Some(1234.5));
        assert_eq!(to_decimal(" 12.99 "), Some(12.99));
        assert_eq!(to_decimal("£7"), Some(7.0));
        assert_eq!(to_decimal("9.95 $"), Some(9.95));
    }

    #[test]
    fn malformed_decimals_are_absent_not_zero() {
        assert_eq!(to_decimal(""), None);
        assert_eq!(to_decimal("   "), None);
        assert_eq!(to_decimal("N/A"), None);
        assert_eq!(to_decimal("NaN"), None);
        assert_eq!(to_decimal("inf"), None);
        assert_eq!(to_decimal("12 sticks"), None);
    }

    #[test]
    fn integers() {
        assert_eq!(to_integer("20"), Some(20));
        assert_eq!(to_integer("1,200"), Some(1200));
        assert_eq!(to_integer("20.5"), None);
        assert_eq!(to_integer("twenty"), None);
        assert_eq!(to_integer(""), None);
    }

    #[test]
    fn clean_strings() {
        assert_eq!(to_clean_string("  Maduro \n"), Some("Maduro".to_string()));
        assert_eq!(to_clean_string("\u{a0} "), None);
    }

    #[test]
    fn first_integer_skips_leading_text() {
        assert_eq!(first_integer("Box of 20"), Some(20));
        assert_eq!(first_integer("1,204 Reviews"), Some(1204));
        assert_eq!(first_integer("Be the first to review"), None);
        assert_eq!(first_integer("(27 reviews)"), Some(27));
        assert_eq!(first_integer("10 Packs of 5"), Some(10));
    }

    #[test]
    fn counts_reject_negative_values() {
        assert_eq!(count("-3"), None);
        assert_eq!(count("11 Reviews"), Some(11));
    }
}
