//! cigarbid.com auction lots: "next" link pagination, lot heading plus a
//! lot-details table on the detail page.
//!
//! Auction facts with no canonical field (starting bid, MSRP, lot id, open and
//! close times) are kept as one auxiliary notes paragraph.

use std::sync::LazyLock;

use async_trait::async_trait;
use cpr_core::coerce::to_decimal;
use cpr_core::{FieldKey, RawFields, RawItem, RawListingItem};
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::html::{element_text, first, first_attr, first_text, select_all};
use crate::{absolute_url, parse_url, ExtractError, Extractor, ListingPage, ListingTarget, PageToken, SourceHttp};

static LOT_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d+)").expect("lot regex must compile"));

#[derive(Debug, Clone)]
pub struct CigarBid {
    source_name: String,
    target: ListingTarget,
    http: SourceHttp,
}

impl CigarBid {
    pub fn new(source_name: String, target: ListingTarget, http: SourceHttp) -> Self {
        Self {
            source_name,
            target,
            http,
        }
    }
}

#[async_trait]
impl Extractor for CigarBid {
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
            PageToken::Page(n) => crate::with_query_param(&self.target.url, "page", n)?,
        };
        let body = self.http.get_text(&url).await?;
        parse_listing(&body, &url, self.target.label.as_deref())
    }

    async fn detail(&self, url: &str) -> Result<RawItem, ExtractError> {
        let body = self.http.get_text(url).await?;
        parse_detail(&body)
    }
}

/// `swatch swatch-medium-full` -> "Medium Full".
fn strength_from_swatch(classes: &str) -> Option<String> {
    let key = classes
        .split_whitespace()
        .find_map(|class| class.strip_prefix("swatch-"))?;
    let words: Vec<String> = key
        .split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(head) => head.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn without_parens(text: String) -> Option<String> {
    let inner = text.trim().trim_start_matches('(').trim_end_matches(')').trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Name, shape, dimensions and pack type share the same title markup on
/// listing cards and lot headings.
fn push_title_parts(fields: &mut RawFields, title: ElementRef<'_>) -> Result<(), ExtractError> {
    fields
        .push_opt(FieldKey::ProductName, first_text(title, ".title-name")?)
        .push_opt(FieldKey::Shape, first_text(title, ".title-shape")?.and_then(without_parens))
        .push_opt(FieldKey::Size, first_text(title, ".dimensions")?)
        .push_opt(FieldKey::Packaging, first_text(title, ".title-pack")?);
    Ok(())
}

pub(crate) fn parse_listing(body: &str, page_url: &str, label: Option<&str>) -> Result<ListingPage, ExtractError> {
    let base = parse_url(page_url)?;
    let document = Html::parse_document(body);
    let root = document.root_element();
    let mut items = Vec::new();

    for card in select_all(root, "div.search-res.search-res-auction")? {
        let Some(title) = first(card, "a.title")? else {
            continue;
        };
        let Some(url) = title.value().attr("href").and_then(|href| absolute_url(&base, href)) else {
            debug!(page_url, "lot without link");
            continue;
        };

        let mut item = RawListingItem::new(url);
        push_title_parts(&mut item.fields, title)?;

        for row in select_all(card, "table.characteristics tr")? {
            let cells = select_all(row, "td")?;
            let [label_cell, value_cell, ..] = cells.as_slice() else {
                continue;
            };
            match element_text(*label_cell).as_deref() {
                Some("Profile") => {
                    let swatch = first_attr(*value_cell, ".strength .swatch", "class")?;
                    item.fields
                        .push_opt(FieldKey::Strength, swatch.as_deref().and_then(strength_from_swatch));
                }
                Some("Wrapper") => {
                    item.fields.push_opt(FieldKey::Wrapper, first_text(*value_cell, "span span")?);
                }
                Some("Origin") => {
                    item.fields
                        .push_opt(FieldKey::CountryOfOrigin, first_text(*value_cell, "span span")?);
                }
                _ => {}
            }
        }

        let bid_to_win = match first(card, ".search-res-info .lot-btw .price-amount")? {
            Some(amount) => element_text(amount).map(|text| text.replace(' ', "")),
            None => None,
        };
        item.fields
            .push_opt(FieldKey::PricePerUnit, bid_to_win)
            .push_opt(FieldKey::Strength, label);
        items.push(item);
    }

    let next = first_attr(root, "a[rel='next'], a.pagination-next", "href")?
        .and_then(|href| absolute_url(&base, &href))
        .map(PageToken::Url);

    Ok(ListingPage { items, next })
}

#[derive(Debug, Default, PartialEq)]
struct LotDetails {
    lot_id: Option<String>,
    status: Option<String>,
    starting_bid: Option<f64>,
    msrp: Option<f64>,
    units_available: Option<String>,
    opens: Option<String>,
    closes: Option<String>,
}

impl LotDetails {
    /// "Starting Bid: $1.00 | MSRP: $12.00 | ..." in a fixed order.
    fn summary(&self) -> Option<String> {
        let mut bits = Vec::new();
        if let Some(bid) = self.starting_bid {
            bits.push(format!("Starting Bid: ${bid:.2}"));
        }
        if let Some(msrp) = self.msrp {
            bits.push(format!("MSRP: ${msrp:.2}"));
        }
        if let Some(units) = &self.units_available {
            bits.push(format!("Units Available: {units}"));
        }
        if let Some(status) = &self.status {
            bits.push(format!("Lot Status: {status}"));
        }
        if let Some(lot_id) = &self.lot_id {
            bits.push(format!("Lot ID: {lot_id}"));
        }
        if let Some(opens) = &self.opens {
            bits.push(format!("Opens: {opens}"));
        }
        if let Some(closes) = &self.closes {
            bits.push(format!("Closes: {closes}"));
        }
        if bits.is_empty() {
            None
        } else {
            Some(bits.join(" | "))
        }
    }
}

pub(crate) fn parse_detail(body: &str) -> Result<RawItem, ExtractError> {
    let document = Html::parse_document(body);
    let root = document.root_element();
    let mut fields = RawFields::new();
    let mut lot = LotDetails::default();

    if let Some(heading) = first(root, "div.lot-heading")? {
        lot.lot_id = first_text(heading, ".lot-id")?
            .and_then(|text| LOT_NUMBER.captures(&text).map(|caps| caps[1].to_string()));
        if let Some(title) = first(heading, ".lot-title span.title")? {
            push_title_parts(&mut fields, title)?;
        }
    }

    let paragraphs: Vec<String> = select_all(
        root,
        "div.list-group-panel[data-panelid='Description'] .list-group-body .p p",
    )?
    .into_iter()
    .filter_map(element_text)
    .collect();
    if !paragraphs.is_empty() {
        fields.push(FieldKey::Description, paragraphs.join(" "));
    }

    for row in select_all(root, "table.lot-details tr")? {
        let cells = select_all(row, "td")?;
        let [label_cell, value_cell, ..] = cells.as_slice() else {
            continue;
        };
        let last_cell = cells.last().unwrap_or(value_cell);
        let Some(label) = element_text(*label_cell) else {
            continue;
        };
        match label.as_str() {
            "Status" => lot.status = element_text(*value_cell),
            "Starting Bid" => lot.starting_bid = element_text(*value_cell).and_then(|text| to_decimal(&text)),
            "Units Available" => lot.units_available = element_text(*value_cell),
            "Opens" => lot.opens = first_attr(*value_cell, "time", "datetime")?,
            "Closes" => lot.closes = first_attr(*value_cell, "time", "datetime")?,
            other if other.starts_with("MSRP") => {
                lot.msrp = element_text(*last_cell).and_then(|text| to_decimal(&text));
            }
            _ => {}
        }
    }

    fields
        .push_opt(FieldKey::StockStatus, lot.status.clone())
        .push_opt(FieldKey::AuxNotes, lot.summary());

    Ok(RawItem::new(fields))
}
