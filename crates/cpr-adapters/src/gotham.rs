//! gothamcigars.com: `?page=N` category grids, positional spec table on the detail page.

use std::sync::LazyLock;

use async_trait::async_trait;
use cpr_core::{FieldKey, RawFields, RawItem, RawListingItem};
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::html::{contains_text, element_text, first, first_attr, first_text, select_all};
use crate::{absolute_url, parse_url, with_query_param, ExtractError, Extractor, ListingPage, ListingTarget, PageToken, SourceHttp};

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex must compile"));

// "10 Packs of 5": outer count goes to the box, inner count to the bundle.
static NESTED_PACKAGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s+\w+\s+of\s+(\d+)").expect("packaging regex must compile")
});

#[derive(Debug, Clone)]
pub struct GothamCigars {
    source_name: String,
    target: ListingTarget,
    http: SourceHttp,
}

impl GothamCigars {
    pub fn new(source_name: String, target: ListingTarget, http: SourceHttp) -> Self {
        Self {
            source_name,
            target,
            http,
        }
    }
}

#[async_trait]
impl Extractor for GothamCigars {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn list_page(&self, page: &PageToken) -> Result<ListingPage, ExtractError> {
        let url = match page {
            PageToken::Page(n) => with_query_param(&self.target.url, "page", n)?,
            PageToken::Url(url) => url.clone(),
        };
        let body = self.http.get_text(&url).await?;
        let items = parse_listing(&body, &url, self.target.label.as_deref())?;
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
    let root = document.root_element();

    let mut cards = select_all(root, ".card")?;
    if cards.is_empty() {
        cards = select_all(root, ".productGrid .product")?;
    }

    let mut items = Vec::new();
    for card in cards {
        let Some(url) = first_attr(card, "a.card-figure, a.card-title, a.product-title, a", "href")?
            .and_then(|href| absolute_url(&base, &href))
        else {
            debug!(page_url, "card without product link");
            continue;
        };

        let name = match first_text(card, ".card-title, .product-title")? {
            Some(name) => Some(name),
            None => first_attr(card, ".card-figure img", "alt")?,
        };
        let rating = first_text(card, "[data-test-info-type='productRating'], .rating--small")?
            .and_then(|text| FIRST_NUMBER.find(&text).map(|m| m.as_str().to_string()));

        let mut item = RawListingItem::new(url);
        item.fields
            .push_opt(FieldKey::ProductName, name)
            .push_opt(FieldKey::PriceRange, first_text(card, ".price, [data-product-price]")?)
            .push_opt(FieldKey::Rating, rating)
            .push_opt(FieldKey::ReviewCount, first_text(card, ".productReview-link")?)
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
        .push_opt(FieldKey::ProductName, first_text(root, ".productView-title, h1")?)
        .push_opt(FieldKey::Brand, first_text(root, ".productView-brand a, .productView-brand")?);

    let description = [
        first_text(
            root,
            ".productView-description-tabContent[data-emthemesmodez-mobile-collapse-content]",
        )?,
        first_text(root, "#tab-warranty .productView-description-tabContent")?,
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    if !description.is_empty() {
        fields.push(FieldKey::Description, description.join(" "));
    }

    if let Some(table) = first(root, ".productView-description-tabContent table")? {
        push_spec_table(&mut fields, table)?;
    }

    let stock = if contains_text(root, "out of stock") {
        "Out of Stock"
    } else {
        "In Stock"
    };
    fields.push(FieldKey::StockStatus, stock);

    Ok(RawItem::new(fields))
}

/// Second row of the spec table, by position: size, packaging, wrapper,
/// binder, filler, strength, origin.
fn push_spec_table(fields: &mut RawFields, table: ElementRef<'_>) -> Result<(), ExtractError> {
    let rows = select_all(table, "tr")?;
    let Some(values) = rows.get(1) else {
        return Ok(());
    };
    let cells = select_all(*values, "td")?;
    if cells.len() < 7 {
        debug!(cells = cells.len(), "spec table too short");
        return Ok(());
    }
    let text = |idx: usize| element_text(cells[idx]);

    fields.push_opt(FieldKey::Size, text(0));
    if let Some(packaging) = text(1) {
        push_packaging(fields, &packaging);
    }
    fields
        .push_opt(FieldKey::Wrapper, text(2))
        .push_opt(FieldKey::Binder, text(3))
        .push_opt(FieldKey::Filler, text(4));

    let strength = match text(5) {
        Some(text) => Some(text),
        None => first_attr(cells[5], "img", "title")?.or(first_attr(cells[5], "img", "alt")?),
    };
    fields
        .push_opt(FieldKey::Strength, strength.map(|s| normalize_profile(&s)))
        .push_opt(FieldKey::CountryOfOrigin, text(6));
    Ok(())
}

fn push_packaging(fields: &mut RawFields, packaging: &str) {
    if let Some(caps) = NESTED_PACKAGING.captures(packaging) {
        fields
            .push(FieldKey::BoxQuantity, &caps[1])
            .push(FieldKey::BundleQuantity, &caps[2]);
    } else if packaging.trim().chars().all(|c| c.is_ascii_digit()) {
        // A bare count in this column is the box count.
        fields.push(FieldKey::BoxQuantity, packaging.trim());
    } else {
        fields.push(FieldKey::Packaging, packaging);
    }
}

/// Map the site's strength wording onto its five buckets.
fn normalize_profile(text: &str) -> String {
    let mellow = text.contains("Mellow");
    let medium = text.contains("Medium");
    let full = text.contains("Full");
    match (mellow, medium, full) {
        (true, true, _) => "Mellow-to-Medium",
        (true, false, _) => "Mellow",
        (false, true, true) => "Medium-to-Full",
        (false, false, true) => "Full",
        (false, true, false) => "Medium",
        (false, false, false) => return text.to_string(),
    }
    .to_string()
}
