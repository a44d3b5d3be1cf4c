//! atlanticcigar.com: numbered strength-category pages, custom-field detail table.

use async_trait::async_trait;
use cpr_core::{FieldKey, RawFields, RawItem, RawListingItem};
use scraper::Html;
use tracing::debug;

use crate::html::{count, element_text, first, first_attr, first_text, select_all};
use crate::{absolute_url, parse_url, with_query_param, ExtractError, Extractor, ListingPage, ListingTarget, PageToken, SourceHttp};

#[derive(Debug, Clone)]
pub struct AtlanticCigar {
    source_name: String,
    target: ListingTarget,
    http: SourceHttp,
}

impl AtlanticCigar {
    pub fn new(source_name: String, target: ListingTarget, http: SourceHttp) -> Self {
        Self {
            source_name,
            target,
            http,
        }
    }

    fn page_url(&self, page: &PageToken) -> Result<String, ExtractError> {
        match page {
            PageToken::Page(n) => with_query_param(&self.target.url, "page", n),
            PageToken::Url(url) => Ok(url.clone()),
        }
    }
}

#[async_trait]
impl Extractor for AtlanticCigar {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn list_page(&self, page: &PageToken) -> Result<ListingPage, ExtractError> {
        let url = self.page_url(page)?;
        let body = self.http.get_text(&url).await?;
        let items = parse_listing(&body, &url, self.target.label.as_deref())?;
        // The grid never links to the next page; keep counting until a page comes back empty.
        let next = if items.is_empty() { None } else { page.advance() };
        Ok(ListingPage { items, next })
    }

    async fn detail(&self, url: &str) -> Result<RawItem, ExtractError> {
        let body = self.http.get_text(url).await?;
        parse_detail(&body)
    }
}

pub(crate) fn parse_listing(
    body: &str,
    page_url: &str,
    label: Option<&str>,
) -> Result<Vec<RawListingItem>, ExtractError> {
    let base = parse_url(page_url)?;
    let document = Html::parse_document(body);
    let mut items = Vec::new();

    for card in select_all(document.root_element(), "article.product-item.product-item-grid")? {
        let Some(url) = first_attr(card, "a.product-item-image", "href")?.and_then(|href| absolute_url(&base, &href))
        else {
            debug!(page_url, "card without product link");
            continue;
        };

        let mut item = RawListingItem::new(url);
        item.fields
            .push_opt(FieldKey::Brand, card.value().attr("data-product-brand"))
            .push_opt(FieldKey::ProductName, first_text(card, "h3.product-item-title a")?)
            .push_opt(FieldKey::PricePerUnit, first_text(card, ".product-item-price .price-without-tax")?)
            .push_opt(FieldKey::Summary, first_text(card, ".product-item-summary")?)
            .push_opt(FieldKey::Strength, label);
        items.push(item);
    }

    Ok(items)
}

pub(crate) fn parse_detail(body: &str) -> Result<RawItem, ExtractError> {
    let document = Html::parse_document(body);
    let root = document.root_element();
    let mut fields = RawFields::new();

    fields
        .push_opt(FieldKey::Brand, first_text(root, "header.product-header a.product-brand")?)
        .push_opt(FieldKey::ProductName, first_text(root, "header.product-header h1.product-title")?);

    if first(root, "header.product-header")?.is_some() {
        let stars = count(root, "header.product-header .rating-star.star-full")?;
        fields.push(FieldKey::Rating, stars.to_string());
        match first_text(root, "header.product-header .ratings-count-text")? {
            Some(text) if text.contains("Be the first") => {
                fields.push(FieldKey::ReviewCount, "0");
            }
            other => {
                fields.push_opt(FieldKey::ReviewCount, other);
            }
        }
    }

    fields.push_opt(
        FieldKey::Description,
        first_text(root, ".description-section .tab-product-description")?,
    );

    for row in select_all(root, ".product-detail-container .product-detail.product-detail-custom-field")? {
        let (Some(key), Some(value)) = (
            first_text(row, ".product-detail-key")?,
            first(row, "[data-product-custom-field]")?.and_then(element_text),
        ) else {
            continue;
        };
        push_custom_field(&mut fields, key.trim_end_matches(':').trim(), value);
    }

    fields.push_opt(
        FieldKey::PricePerBox,
        first_text(root, ".product-detail-container .price .price-value")?,
    );
    fields.push_opt(
        FieldKey::StockStatus,
        first_text(
            root,
            ".product-detail-container .product-detail-stock-level .product-detail-key",
        )?,
    );

    Ok(RawItem::new(fields))
}

fn push_custom_field(fields: &mut RawFields, key: &str, value: String) {
    match key {
        "Country of Origin" => {
            fields.push(FieldKey::CountryOfOrigin, value);
        }
        "Shape" => {
            fields.push(FieldKey::Shape, value);
        }
        "Strength" => {
            fields.push(FieldKey::Strength, value);
        }
        "Size" => {
            fields.push(FieldKey::Size, value);
        }
        "Color" => {
            fields.push(FieldKey::WrapperColor, value);
        }
        "Wrapper" => {
            fields.push(FieldKey::WrapperLeaf, value);
        }
        "Binder / Filler" => {
            let (binder, filler) = match value.split_once('/') {
                Some((binder, filler)) => (binder.trim(), Some(filler.trim())),
                None => (value.trim(), None),
            };
            fields.push(FieldKey::Binder, binder).push_opt(FieldKey::Filler, filler);
        }
        other => debug!(key = other, "ignoring custom field"),
    }
}
