//! famous-smoke.com: "next" link pagination, attribute spec table on the detail page.

use async_trait::async_trait;
use cpr_core::coerce::to_decimal;
use cpr_core::{FieldKey, RawFields, RawItem, RawListingItem};
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::html::{count, element_text, first, first_attr, first_text, select_all};
use crate::{absolute_url, parse_url, ExtractError, Extractor, ListingPage, ListingTarget, PageToken, SourceHttp};

#[derive(Debug, Clone)]
pub struct FamousSmoke {
    source_name: String,
    target: ListingTarget,
    http: SourceHttp,
}

impl FamousSmoke {
    pub fn new(source_name: String, target: ListingTarget, http: SourceHttp) -> Self {
        Self {
            source_name,
            target,
            http,
        }
    }
}

#[async_trait]
impl Extractor for FamousSmoke {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn first_page(&self) -> PageToken {
        PageToken::Url(self.target.url.clone())
    }

    async fn list_page(&self, page: &PageToken) -> Result<ListingPage, ExtractError> {
        let url = match page {
            PageToken::Url(url) => url.clone(),
            PageToken::Page(1) => self.target.url.clone(),
            PageToken::Page(n) => crate::with_query_param(&self.target.url, "p", n)?,
        };
        let body = self.http.get_text(&url).await?;
        parse_listing(&body, &url, self.target.label.as_deref())
    }

    async fn detail(&self, url: &str) -> Result<RawItem, ExtractError> {
        let body = self.http.get_text(url).await?;
        parse_detail(&body)
    }
}

/// `data-price-amount="8.5"` -> "8.50" so the two-decimal money rule accepts it.
fn price_attribute(scope: ElementRef<'_>) -> Result<Option<String>, ExtractError> {
    Ok(first_attr(scope, "[data-price-type='finalPrice']", "data-price-amount")?
        .and_then(|raw| to_decimal(&raw))
        .map(|amount| format!("{amount:.2}")))
}

pub(crate) fn parse_listing(body: &str, page_url: &str, label: Option<&str>) -> Result<ListingPage, ExtractError> {
    let base = parse_url(page_url)?;
    let document = Html::parse_document(body);
    let root = document.root_element();
    let mut items = Vec::new();

    for card in select_all(root, "div.product-item-info")? {
        let Some(link) = first(card, "strong.product-item-name a.product-item-link")? else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(|href| absolute_url(&base, href)) else {
            debug!(page_url, "card without product link");
            continue;
        };

        let stars = count(card, ".sv-product-review-star--filled")?;
        let reviews = first_text(card, ".sv-product-review-small__text")?
            .and_then(|text| text.split_whitespace().next().map(str::to_string));

        let mut item = RawListingItem::new(url);
        item.fields
            .push_opt(FieldKey::ProductName, element_text(link))
            .push(FieldKey::Rating, stars.to_string())
            .push_opt(FieldKey::ReviewCount, reviews)
            .push_opt(FieldKey::PricePerUnit, price_attribute(card)?)
            .push_opt(FieldKey::Strength, label);
        items.push(item);
    }

    let next = first_attr(root, "a.action.next", "href")?
        .and_then(|href| absolute_url(&base, &href))
        .map(PageToken::Url);

    Ok(ListingPage { items, next })
}

pub(crate) fn parse_detail(body: &str) -> Result<RawItem, ExtractError> {
    let document = Html::parse_document(body);
    let root = document.root_element();
    let mut fields = RawFields::new();

    for cell in select_all(root, "table#product-attribute-specs-table td[data-th]")? {
        let (Some(label), Some(value)) = (cell.value().attr("data-th"), element_text(cell)) else {
            continue;
        };
        let key = match label.trim() {
            "Brand" => FieldKey::Brand,
            "Country of Origin" => FieldKey::CountryOfOrigin,
            "Wrapper Color" => FieldKey::WrapperColor,
            "Wrapper Leaf" => FieldKey::WrapperLeaf,
            "Wrapper Origin" => FieldKey::WrapperOrigin,
            "Wrapper" => FieldKey::Wrapper,
            "Strength" | "Profile" => FieldKey::Strength,
            "Cigar Shape" => FieldKey::Shape,
            "Quantity per Packaging" => FieldKey::Packaging,
            "Cigar Size" => FieldKey::Size,
            "Filler" => FieldKey::Filler,
            "Binder" => FieldKey::Binder,
            other => {
                debug!(label = other, "ignoring spec row");
                continue;
            }
        };
        fields.push(key, value);
    }

    // An out-of-stock notice wins over a lingering add-to-cart button.
    if html_mentions_out_of_stock(root) {
        fields.push(FieldKey::StockStatus, "Out of Stock");
    } else if first(root, "button.action.tocart")?.is_some() {
        fields.push(FieldKey::StockStatus, "In Stock");
    }

    fields.push_opt(FieldKey::PricePerUnit, price_attribute(root)?);

    Ok(RawItem::new(fields))
}

fn html_mentions_out_of_stock(root: ElementRef<'_>) -> bool {
    root.text().any(|chunk| chunk.contains("Out of Stock"))
}
