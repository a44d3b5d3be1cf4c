//! cigaraficionado.com ratings search: a review source, not a retailer.
//!
//! Scores are on the magazine's 100-point scale and are stored as-is. Wrappers
//! are written "Country Leaf" ("Nicaragua Habano") and go through the combined
//! wrapper decomposer. There is no stock or box pricing.

use async_trait::async_trait;
use cpr_core::{FieldKey, RawFields, RawItem, RawListingItem};
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::html::{element_text, first, first_text, select_all};
use crate::{absolute_url, parse_url, with_query_param, ExtractError, Extractor, ListingPage, ListingTarget, PageToken, SourceHttp};

#[derive(Debug, Clone)]
pub struct CigarAficionado {
    source_name: String,
    target: ListingTarget,
    http: SourceHttp,
}

impl CigarAficionado {
    pub fn new(source_name: String, target: ListingTarget, http: SourceHttp) -> Self {
        Self {
            source_name,
            target,
            http,
        }
    }
}

#[async_trait]
impl Extractor for CigarAficionado {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn list_page(&self, page: &PageToken) -> Result<ListingPage, ExtractError> {
        let url = match page {
            PageToken::Page(n) => with_query_param(&self.target.url, "page", n)?,
            PageToken::Url(url) => url.clone(),
        };
        let body = self.http.get_text(&url).await?;
        let items = parse_listing(&body, &url)?;
        let next = if items.is_empty() { None } else { page.advance() };
        Ok(ListingPage { items, next })
    }

    async fn detail(&self, url: &str) -> Result<RawItem, ExtractError> {
        let body = self.http.get_text(url).await?;
        parse_detail(&body)
    }
}

pub(crate) fn parse_listing(body: &str, page_url: &str) -> Result<Vec<RawListingItem>, ExtractError> {
    let base = parse_url(page_url)?;
    let document = Html::parse_document(body);
    let mut items = Vec::new();

    for block in select_all(document.root_element(), "div.row[id^='cigar-']")? {
        let Some(link) = first(block, "h4 a")? else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(|href| absolute_url(&base, href)) else {
            debug!(page_url, "rating without link");
            continue;
        };

        let mut item = RawListingItem::new(url);
        item.fields
            .push_opt(FieldKey::ProductName, element_text(link))
            .push_opt(FieldKey::Rating, first_text(block, ".score-number")?);
        items.push(item);
    }

    Ok(items)
}

pub(crate) fn parse_detail(body: &str) -> Result<RawItem, ExtractError> {
    let document = Html::parse_document(body);
    let root = document.root_element();
    let mut fields = RawFields::new();

    for column in select_all(root, ".attributes-item")? {
        let Some(title) = first_text(column, ".attributes-item_title")? else {
            continue;
        };
        let key = match title.to_ascii_uppercase().as_str() {
            "LENGTH" => FieldKey::Length,
            "STRENGTH" => FieldKey::Strength,
            _ => continue,
        };
        fields.push_opt(key, first_text(column, ".attributes-item_label strong")?);
    }
    fields.push_opt(FieldKey::RingGauge, first_text(root, ".attributes-item_gauge")?);

    for (label, value) in labelled_values(root)? {
        let key = match label.as_str() {
            "Size" => FieldKey::Shape,
            "Filler" => FieldKey::Filler,
            "Binder" => FieldKey::Binder,
            "Wrapper" => FieldKey::Wrapper,
            "Country" => FieldKey::CountryOfOrigin,
            "Price" => FieldKey::PricePerUnit,
            _ => continue,
        };
        fields.push(key, value);
    }

    fields.push_opt(FieldKey::Description, first_text(root, ".cigar-detail_tastingnote p")?);

    Ok(RawItem::new(fields))
}

/// `<li><strong>Filler:</strong> Nicaragua</li>` -> ("Filler", "Nicaragua").
fn labelled_values(root: ElementRef<'_>) -> Result<Vec<(String, String)>, ExtractError> {
    let mut pairs = Vec::new();
    for strong in select_all(root, "strong")? {
        let (Some(label_text), Some(parent_text)) = (
            element_text(strong),
            strong.parent().and_then(ElementRef::wrap).and_then(element_text),
        ) else {
            continue;
        };
        let value = parent_text
            .strip_prefix(label_text.as_str())
            .unwrap_or(&parent_text)
            .trim()
            .trim_start_matches(':')
            .trim();
        if value.is_empty() {
            continue;
        }
        let label = label_text.trim_end_matches(':').trim().to_string();
        pairs.push((label, value.to_string()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_split_from_their_values() {
        let html = r#"<ul>
            <li><strong>Filler:</strong> Nicaragua, Dominican Republic</li>
            <li><strong>Binder</strong>: Ecuador</li>
            <li><strong>Price:</strong></li>
        </ul>"#;
        let document = Html::parse_document(html);
        let pairs = labelled_values(document.root_element()).expect("parse");
        assert_eq!(
            pairs,
            vec![
                ("Filler".to_string(), "Nicaragua, Dominican Republic".to_string()),
                ("Binder".to_string(), "Ecuador".to_string()),
            ]
        );
    }
}
