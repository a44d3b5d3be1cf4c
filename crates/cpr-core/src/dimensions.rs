//! Length / ring gauge extraction from free-form size text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::coerce::{first_integer, to_decimal};

// <length>[ <fraction>]["] x <ring>
static SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\d+(?:\.\d+)?)(?:[\s-]+(\d+/\d+))?\s*["”″]?\s*[xX×]\s*(\d+)"#)
        .expect("size regex must compile")
});

static LENGTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)(?:[\s-]+(\d+/\d+))?").expect("length regex must compile")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_inches: Option<f64>,
    pub ring_gauge: Option<u32>,
    pub shape: Option<String>,
}

fn fraction_value(fraction: &str) -> f64 {
    match fraction {
        "1/8" => 0.125,
        "1/4" => 0.25,
        "3/8" => 0.375,
        "1/2" => 0.5,
        "5/8" => 0.625,
        "3/4" => 0.75,
        "7/8" => 0.875,
        _ => 0.0,
    }
}

fn length_from_parts(whole: &str, fraction: Option<&str>) -> Option<f64> {
    let whole = to_decimal(whole)?;
    Some(whole + fraction.map(fraction_value).unwrap_or(0.0))
}

/// Parse "5 1/8 x 52", "6x54", `4.0"x52`, "Toro 6 × 52 (Toro)".
///
/// The first size pattern in the text wins. No match means nothing is
/// guessed: all fields are absent. Ring gauge is taken as-is (1/64 inch units).
pub fn parse_dimensions(text: &str) -> Dimensions {
    let Some(caps) = SIZE_PATTERN.captures(text) else {
        return Dimensions::default();
    };
    let (Some(whole), Some(ring), Some(full)) = (caps.get(1), caps.get(3), caps.get(0)) else {
        return Dimensions::default();
    };

    Dimensions {
        length_inches: length_from_parts(whole.as_str(), caps.get(2).map(|m| m.as_str())),
        ring_gauge: ring.as_str().parse::<u32>().ok(),
        shape: adjacent_parenthetical(text, full.start(), full.end()),
    }
}

/// Parenthetical right after (or right before) the size match, unless it is itself a size.
fn adjacent_parenthetical(text: &str, start: usize, end: usize) -> Option<String> {
    let after = text[end..].trim_start();
    let candidate = if let Some(rest) = after.strip_prefix('(') {
        rest.split_once(')').map(|(inner, _)| inner)
    } else {
        let before = text[..start].trim_end();
        before
            .strip_suffix(')')
            .and_then(|rest| rest.rfind('(').map(|open| &rest[open + 1..]))
    }?;

    let label = candidate.trim();
    if label.is_empty() || SIZE_PATTERN.is_match(label) {
        return None;
    }
    Some(label.to_string())
}

/// Standalone length attribute: `5 1/8"`, `6.5`, `7-1/2 in`.
pub fn parse_length(text: &str) -> Option<f64> {
    let caps = LENGTH_PATTERN.captures(text)?;
    length_from_parts(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))
}

/// Standalone ring gauge attribute: "52", "52 RG", "Ring: 50".
pub fn parse_ring_gauge(text: &str) -> Option<u32> {
    first_integer(text).and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_fraction_length() {
        let dims = parse_dimensions("5 1/8 x 52");
        assert_eq!(dims.length_inches, Some(5.125));
        assert_eq!(dims.ring_gauge, Some(52));
    }

    #[test]
    fn compact_notation() {
        let dims = parse_dimensions("6x54");
        assert_eq!(dims.length_inches, Some(6.0));
        assert_eq!(dims.ring_gauge, Some(54));
    }

    #[test]
    fn every_known_fraction() {
        for (fraction, expected) in [
            ("1/8", 7.125),
            ("1/4", 7.25),
            ("3/8", 7.375),
            ("1/2", 7.5),
            ("5/8", 7.625),
            ("3/4", 7.75),
            ("7/8", 7.875),
        ] {
            let dims = parse_dimensions(&format!("7 {fraction} X 49"));
            assert_eq!(dims.length_inches, Some(expected), "{fraction}");
            assert_eq!(dims.ring_gauge, Some(49));
        }
    }

    #[test]
    fn unknown_fraction_defaults_to_whole_number() {
        let dims = parse_dimensions("5 2/3 x 50");
        assert_eq!(dims.length_inches, Some(5.0));
        assert_eq!(dims.ring_gauge, Some(50));
    }

    #[test]
    fn malformed_input_is_absent() {
        assert_eq!(parse_dimensions("N/A"), Dimensions::default());
        assert_eq!(parse_dimensions(""), Dimensions::default());
        assert_eq!(parse_dimensions("Robusto"), Dimensions::default());
    }

    #[test]
    fn unicode_times_sign_quotes_and_decimal_length() {
        let dims = parse_dimensions("Robusto (5.5×54)");
        assert_eq!(dims.length_inches, Some(5.5));
        assert_eq!(dims.ring_gauge, Some(54));
        assert_eq!(dims.shape, None);

        let dims = parse_dimensions("(4.0\"x52)");
        assert_eq!(dims.length_inches, Some(4.0));
        assert_eq!(dims.ring_gauge, Some(52));
    }

    #[test]
    fn first_match_wins() {
        let dims = parse_dimensions("Toro 6 x 52 - Sampler 4x40");
        assert_eq!(dims.length_inches, Some(6.0));
        assert_eq!(dims.ring_gauge, Some(52));
    }

    #[test]
    fn adjacent_parenthetical_is_shape() {
        let dims = parse_dimensions("6 1/2 x 52 (Torpedo)");
        assert_eq!(dims.length_inches, Some(6.5));
        assert_eq!(dims.shape.as_deref(), Some("Torpedo"));

        let dims = parse_dimensions("(Belicoso) 5 x 52");
        assert_eq!(dims.shape.as_deref(), Some("Belicoso"));
    }

    #[test]
    fn standalone_length_and_ring() {
        assert_eq!(parse_length("5 1/8\""), Some(5.125));
        assert_eq!(parse_length("6.5"), Some(6.5));
        assert_eq!(parse_length("7-1/2 in"), Some(7.5));
        assert_eq!(parse_length("long"), None);
        assert_eq!(parse_ring_gauge("52 RG"), Some(52));
        assert_eq!(parse_ring_gauge("n/a"), None);
    }
}
