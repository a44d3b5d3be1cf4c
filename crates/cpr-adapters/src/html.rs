//! Small scraper helpers shared by the HTML extractors.

use cpr_core::coerce::collapse_whitespace;
use scraper::{ElementRef, Selector};

use crate::ExtractError;

pub(crate) fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|err| ExtractError::Selector {
        selector: css.to_string(),
        message: err.to_string(),
    })
}

/// Visible text of an element, whitespace collapsed; `None` when blank.
pub(crate) fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub(crate) fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Result<Vec<ElementRef<'a>>, ExtractError> {
    let sel = selector(css)?;
    Ok(scope.select(&sel).collect())
}

pub(crate) fn first<'a>(scope: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>, ExtractError> {
    let sel = selector(css)?;
    Ok(scope.select(&sel).next())
}

pub(crate) fn first_text(scope: ElementRef<'_>, css: &str) -> Result<Option<String>, ExtractError> {
    Ok(first(scope, css)?.and_then(element_text))
}

pub(crate) fn first_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> Result<Option<String>, ExtractError> {
    Ok(first(scope, css)?
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string))
}

pub(crate) fn count(scope: ElementRef<'_>, css: &str) -> Result<usize, ExtractError> {
    let sel = selector(css)?;
    Ok(scope.select(&sel).count())
}

/// Case-insensitive search over all text in `scope`.
pub(crate) fn contains_text(scope: ElementRef<'_>, needle: &str) -> bool {
    let needle = needle.to_ascii_lowercase();
    scope
        .text()
        .any(|chunk| chunk.to_ascii_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn text_is_collapsed_and_blank_is_none() {
        let doc = Html::parse_document("<div><p class='a'>  Padron \n <b>1964</b> </p><p class='b'>  </p></div>");
        let root = doc.root_element();
        assert_eq!(first_text(root, "p.a").expect("sel").as_deref(), Some("Padron 1964"));
        assert_eq!(first_text(root, "p.b").expect("sel"), None);
        assert_eq!(first_text(root, "p.missing").expect("sel"), None);
    }

    #[test]
    fn attributes_and_counts() {
        let doc = Html::parse_document(
            "<div data-x=' 7 '><i class='star full'></i><i class='star full'></i><i class='star'></i></div>",
        );
        let root = doc.root_element();
        assert_eq!(first_attr(root, "div", "data-x").expect("sel").as_deref(), Some("7"));
        assert_eq!(count(root, ".star.full").expect("sel"), 2);
        assert!(!contains_text(root, "anything"));
    }

    #[test]
    fn bad_selector_is_an_error() {
        let doc = Html::parse_document("<p></p>");
        assert!(matches!(
            first_text(doc.root_element(), "p[[["),
            Err(ExtractError::Selector { .. })
        ));
    }
}
