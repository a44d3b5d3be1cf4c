//! Heuristic split of a combined wrapper description into color, leaf and origin.
//!
//! "Connecticut Broadleaf Maduro (USA)" -> color "Maduro", leaf "Connecticut
//! Broadleaf", origin "USA". Vocabulary entries are matched case-insensitively,
//! longest first, and unmatched vocabulary simply leaves the field absent.

use std::ops::Range;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::coerce::collapse_whitespace;

/// (needle, canonical label)
const WRAPPER_COLORS: &[(&str, &str)] = &[
    ("natural", "Natural"),
    ("maduro", "Maduro"),
    ("oscuro", "Oscuro"),
    ("claro", "Claro"),
    ("double claro", "Double Claro"),
    ("ems", "EMS"),
    ("sun grown", "Sun Grown"),
    ("sungrown", "Sungrown"),
    ("colorado", "Colorado"),
    ("colorado claro", "Colorado Claro"),
    ("colorado maduro", "Colorado Maduro"),
];

const WRAPPER_ORIGINS: &[(&str, &str)] = &[
    ("usa", "USA"),
    ("united states", "USA"),
    ("honduras", "Honduras"),
    ("nicaragua", "Nicaragua"),
    ("dominican", "Dominican Republic"),
    ("dominican republic", "Dominican Republic"),
    ("mexico", "Mexico"),
    ("ecuador", "Ecuador"),
    ("brazil", "Brazil"),
    ("cameroon", "Cameroon"),
    ("panama", "Panama"),
    ("costa rica", "Costa Rica"),
];

fn longest_first(vocabulary: &'static [(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
    let mut sorted = vocabulary.to_vec();
    sorted.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    sorted
}

static COLORS_BY_LENGTH: LazyLock<Vec<(&'static str, &'static str)>> =
    LazyLock::new(|| longest_first(WRAPPER_COLORS));
static ORIGINS_BY_LENGTH: LazyLock<Vec<(&'static str, &'static str)>> =
    LazyLock::new(|| longest_first(WRAPPER_ORIGINS));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperParts {
    pub color: Option<String>,
    pub leaf: Option<String>,
    pub origin: Option<String>,
}

fn find_first(
    lowered: &str,
    vocabulary: &[(&'static str, &'static str)],
) -> Option<(&'static str, Range<usize>)> {
    vocabulary.iter().find_map(|(needle, label)| {
        lowered
            .find(needle)
            .map(|start| (*label, start..start + needle.len()))
    })
}

pub fn decompose_wrapper(combined: &str) -> WrapperParts {
    if combined.trim().is_empty() {
        return WrapperParts::default();
    }

    // ASCII lowercasing keeps byte offsets aligned with the original text.
    let lowered = combined.to_ascii_lowercase();
    let color = find_first(&lowered, &COLORS_BY_LENGTH);
    let origin = find_first(&lowered, &ORIGINS_BY_LENGTH);

    let mut removed: Vec<Range<usize>> = color
        .iter()
        .chain(origin.iter())
        .map(|(_, span)| span.clone())
        .collect();
    removed.sort_by_key(|span| span.start);

    let mut remainder = String::with_capacity(combined.len());
    let mut cursor = 0;
    for span in removed {
        if span.start < cursor {
            cursor = cursor.max(span.end);
            continue;
        }
        remainder.push_str(&combined[cursor..span.start]);
        remainder.push(' ');
        cursor = span.end;
    }
    remainder.push_str(&combined[cursor..]);

    WrapperParts {
        color: color.map(|(label, _)| label.to_string()),
        leaf: clean_leaf_remainder(&remainder),
        origin: origin.map(|(label, _)| label.to_string()),
    }
}

fn clean_leaf_remainder(remainder: &str) -> Option<String> {
    let mut text = collapse_whitespace(remainder);
    loop {
        let next = collapse_whitespace(&text.replace("( )", " ").replace("()", " "));
        if next == text {
            break;
        }
        text = next;
    }
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || "-,/()|:;".contains(c));
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(color: Option<&str>, leaf: Option<&str>, origin: Option<&str>) -> WrapperParts {
        WrapperParts {
            color: color.map(str::to_string),
            leaf: leaf.map(str::to_string),
            origin: origin.map(str::to_string),
        }
    }

    #[test]
    fn combined_broadleaf_description() {
        assert_eq!(
            decompose_wrapper("Connecticut Broadleaf Maduro (USA)"),
            parts(Some("Maduro"), Some("Connecticut Broadleaf"), Some("USA"))
        );
    }

    #[test]
    fn empty_input_is_all_absent() {
        assert_eq!(decompose_wrapper(""), WrapperParts::default());
        assert_eq!(decompose_wrapper("   "), WrapperParts::default());
    }

    #[test]
    fn longer_vocabulary_entries_win() {
        let result = decompose_wrapper("Colorado Maduro Habano (Nicaragua)");
        assert_eq!(result.color.as_deref(), Some("Colorado Maduro"));
        assert_eq!(result.leaf.as_deref(), Some("Habano"));

        let result = decompose_wrapper("Dominican Republic Corojo");
        assert_eq!(result.origin.as_deref(), Some("Dominican Republic"));
        assert_eq!(result.leaf.as_deref(), Some("Corojo"));
    }

    #[test]
    fn case_insensitive_and_aliases() {
        let result = decompose_wrapper("HABANO OSCURO - united states");
        assert_eq!(result, parts(Some("Oscuro"), Some("HABANO"), Some("USA")));
    }

    #[test]
    fn unmatched_vocabulary_keeps_text_as_leaf() {
        assert_eq!(
            decompose_wrapper("Sumatra"),
            parts(None, Some("Sumatra"), None)
        );
    }

    #[test]
    fn only_vocabulary_leaves_no_leaf() {
        assert_eq!(
            decompose_wrapper("Natural (Ecuador)"),
            parts(Some("Natural"), None, Some("Ecuador"))
        );
    }
}
