//! cigarsdirect.com: Shopify `products.json`, one record per variant.
//!
//! The JSON listing already carries everything the site publishes, so the
//! detail step does not fetch anything.

use async_trait::async_trait;
use cpr_core::coerce::{collapse_whitespace, to_clean_string};
use cpr_core::{parse_dimensions, FieldKey, RawItem, RawListingItem};
use scraper::Html;
use serde::Deserialize;

use crate::{parse_url, with_query_param, ExtractError, Extractor, ListingPage, ListingTarget, PageToken, SourceHttp};

pub const DEFAULT_PAGE_SIZE: usize = 250;

const PACKAGING_WORDS: &[&str] = &["box", "bundle", "pack", "single", "of"];

#[derive(Debug, Deserialize)]
struct ProductsPage {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    title: Option<String>,
    vendor: Option<String>,
    body_html: Option<String>,
    handle: String,
    #[serde(default)]
    variants: Vec<Variant>,
}

#[derive(Debug, Deserialize)]
struct Variant {
    id: u64,
    title: Option<String>,
    price: Option<String>,
    available: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CigarsDirect {
    source_name: String,
    target: ListingTarget,
    http: SourceHttp,
    page_size: usize,
}

impl CigarsDirect {
    pub fn new(source_name: String, target: ListingTarget, http: SourceHttp) -> Self {
        Self {
            source_name,
            target,
            http,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl Extractor for CigarsDirect {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn page_size(&self) -> Option<usize> {
        Some(self.page_size)
    }

    async fn list_page(&self, page: &PageToken) -> Result<ListingPage, ExtractError> {
        let url = match page {
            PageToken::Page(n) => {
                let limited = with_query_param(&self.target.url, "limit", self.page_size)?;
                with_query_param(&limited, "page", n)?
            }
            PageToken::Url(url) => url.clone(),
        };
        let body = self.http.get_text(&url).await?;
        let items = parse_products(&body, &url, self.target.label.as_deref())?;
        // No next link in the JSON; the traversal compares the count with the page size.
        Ok(ListingPage { items, next: None })
    }

    async fn detail(&self, _url: &str) -> Result<RawItem, ExtractError> {
        Ok(RawItem::default())
    }
}

/// `page_size` counts products, but items are emitted per variant.
pub(crate) fn parse_products(
    body: &str,
    page_url: &str,
    label: Option<&str>,
) -> Result<Vec<RawListingItem>, ExtractError> {
    let page: ProductsPage = serde_json::from_str(body).map_err(|source| ExtractError::Json {
        url: page_url.to_string(),
        source,
    })?;
    let mut base = parse_url(page_url)?;
    base.set_query(None);

    let mut items = Vec::new();
    for product in page.products {
        let description = product.body_html.as_deref().and_then(html_to_text);
        for variant in &product.variants {
            let mut url = base.clone();
            url.set_path(&format!("/products/{}", product.handle));
            url.query_pairs_mut().append_pair("variant", &variant.id.to_string());

            let mut item = RawListingItem::new(String::from(url));
            item.fields
                .push_opt(FieldKey::ProductName, product.title.as_deref())
                .push_opt(FieldKey::Brand, product.vendor.as_deref())
                .push_opt(FieldKey::Description, description.as_deref())
                .push_opt(FieldKey::Strength, label);

            if let Some(title) = variant.title.as_deref() {
                push_variant_title(&mut item, title, variant.price.as_deref());
            } else {
                item.fields.push_opt(FieldKey::PricePerUnit, variant.price.as_deref());
            }
            if let Some(available) = variant.available {
                item.fields.push(
                    FieldKey::StockStatus,
                    if available { "In Stock" } else { "Out of Stock" },
                );
            }
            items.push(item);
        }
    }
    Ok(items)
}

/// "Robusto 5 x 50", "Toro / 6 x 52", "Box of 20 / 5 x 50", "Single 6x50".
fn push_variant_title(item: &mut RawListingItem, title: &str, price: Option<&str>) {
    let lower = title.to_ascii_lowercase();
    let price_key = if lower.contains("bundle") {
        FieldKey::PricePerBundle
    } else if lower.contains("box") {
        FieldKey::PricePerBox
    } else {
        FieldKey::PricePerUnit
    };
    item.fields.push_opt(price_key, price);

    if price_key != FieldKey::PricePerUnit {
        item.fields.push(FieldKey::Packaging, title);
    }

    let dims = parse_dimensions(title);
    if dims.length_inches.is_none() {
        return;
    }
    item.fields.push(FieldKey::Size, title);
    if let Some(shape) = shape_before_size(title) {
        item.fields.push(FieldKey::Shape, shape);
    }
}

/// Text preceding the size, unless it is a packaging phrase or a count.
fn shape_before_size(title: &str) -> Option<String> {
    let cut = title.find(|c: char| c.is_ascii_digit())?;
    let prefix = title[..cut].replace(['/', '-'], " ");
    let prefix = prefix.split_whitespace().collect::<Vec<_>>().join(" ");
    let packaging_word = prefix
        .split(' ')
        .any(|word| PACKAGING_WORDS.contains(&word.to_ascii_lowercase().as_str()));
    if prefix.is_empty() || packaging_word {
        return None;
    }
    Some(prefix)
}

fn html_to_text(fragment: &str) -> Option<String> {
    let parsed = Html::parse_fragment(fragment);
    let text = parsed.root_element().text().collect::<Vec<_>>().join(" ");
    to_clean_string(&collapse_whitespace(&text))
}
