//! Listing card + detail page candidates -> one [`CanonicalRecord`].
//!
//! Precedence for every field is detail page first, then listing card, then
//! anything derived from the product name. Size is special-cased: an explicit
//! length / ring gauge attribute beats a combined "L x R" string on the same
//! page.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coerce::{collapse_whitespace, count, first_integer, non_negative_decimal, to_clean_string};
use crate::dimensions::{parse_dimensions, parse_length, parse_ring_gauge};
use crate::price::{parse_price, parse_price_range};
use crate::reconcile::{first_present, ParseFailure, Reconciler};
use crate::wrapper::decompose_wrapper;
use crate::{CanonicalRecord, FieldKey, RawFields, RawItem, RawListingItem, StockStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyOptions {
    /// Fall back to the first N words of the product name when no brand
    /// candidate exists. Heuristic only; `None` disables it.
    pub brand_from_title_words: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("record is missing {0}")]
    MissingIdentity(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRecord {
    pub record: CanonicalRecord,
    pub parse_failures: Vec<ParseFailure>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingQuantities {
    pub bundle_quantity: Option<u32>,
    pub box_quantity: Option<u32>,
}

/// Route a "quantity per package" label to bundle or box quantity.
///
/// "Bundle of 10" -> bundle, "Box of 20" -> box; anything else ("Pack of 5")
/// is left on neither field.
pub fn route_packaging(label: &str) -> PackagingQuantities {
    let lower = label.to_ascii_lowercase();
    let quantity = first_integer(label).and_then(|v| u32::try_from(v).ok());
    PackagingQuantities {
        bundle_quantity: quantity.filter(|_| lower.contains("bundle")),
        box_quantity: quantity.filter(|_| lower.contains("box")),
    }
}

/// Heuristic brand from the leading words of a product name.
pub fn brand_from_title(title: &str, words: usize) -> Option<String> {
    if words == 0 {
        return None;
    }
    let brand = title.split_whitespace().take(words).collect::<Vec<_>>().join(" ");
    to_clean_string(&brand)
}

struct Sources<'a> {
    detail: &'a RawFields,
    listing: &'a RawFields,
}

impl<'a> Sources<'a> {
    fn all(&self, key: FieldKey) -> impl Iterator<Item = &'a str> {
        self.detail
            .get(key)
            .iter()
            .chain(self.listing.get(key))
            .map(String::as_str)
    }

    fn text(&self, key: FieldKey) -> Option<String> {
        first_present(self.all(key).map(to_clean_string))
    }

    /// Explicit attribute, then combined size string, per page; the product
    /// name is consulted only when no page yields a value.
    fn resolve_size<T>(
        &self,
        reconciler: &mut Reconciler,
        explicit: FieldKey,
        parse_explicit: impl Fn(&str) -> Option<T>,
        from_size: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        for fields in [self.detail, self.listing] {
            let attributes = fields.get(explicit).iter().map(String::as_str);
            if let Some(value) = reconciler.resolve(explicit, attributes, &parse_explicit) {
                return Some(value);
            }
            let sizes = fields.get(FieldKey::Size).iter().map(String::as_str);
            if let Some(value) = reconciler.resolve(FieldKey::Size, sizes, &from_size) {
                return Some(value);
            }
        }
        first_present(self.names().map(&from_size))
    }

    fn names(&self) -> impl Iterator<Item = &'a str> {
        self.all(FieldKey::ProductName)
    }
}

pub fn assemble_record(
    source_name: &str,
    listing: &RawListingItem,
    detail: &RawItem,
    scraped_at: NaiveDate,
    options: &AssemblyOptions,
) -> Result<AssembledRecord, AssembleError> {
    let source_name = to_clean_string(source_name).ok_or(AssembleError::MissingIdentity("source_name"))?;
    let url = to_clean_string(&listing.url).ok_or(AssembleError::MissingIdentity("url"))?;

    let sources = Sources {
        detail: &detail.fields,
        listing: &listing.fields,
    };
    let mut reconciler = Reconciler::new();

    let product_name = sources.text(FieldKey::ProductName);
    let brand = first_present([
        sources.text(FieldKey::Brand),
        options
            .brand_from_title_words
            .zip(product_name.as_deref())
            .and_then(|(words, name)| brand_from_title(name, words)),
    ]);

    let length_inches = sources.resolve_size(&mut reconciler, FieldKey::Length, parse_length, |raw| {
        parse_dimensions(raw).length_inches
    });
    let ring_gauge = sources.resolve_size(&mut reconciler, FieldKey::RingGauge, parse_ring_gauge, |raw| {
        parse_dimensions(raw).ring_gauge
    });
    let shape = first_present([
        sources.text(FieldKey::Shape),
        first_present(sources.all(FieldKey::Size).map(|size| parse_dimensions(size).shape)),
    ]);

    let combined_wrapper = sources
        .all(FieldKey::Wrapper)
        .find(|raw| !raw.trim().is_empty())
        .map(decompose_wrapper)
        .unwrap_or_default();
    let wrapper_color = first_present([sources.text(FieldKey::WrapperColor), combined_wrapper.color]);
    let wrapper_leaf = first_present([sources.text(FieldKey::WrapperLeaf), combined_wrapper.leaf]);
    let wrapper_origin_country = first_present([sources.text(FieldKey::WrapperOrigin), combined_wrapper.origin]);

    let price_range = first_present(sources.all(FieldKey::PriceRange).map(parse_price_range));
    let price_per_unit = first_present([
        reconciler.resolve(FieldKey::PricePerUnit, sources.all(FieldKey::PricePerUnit), parse_price),
        price_range.map(|range| range.low),
    ]);
    let price_per_bundle =
        reconciler.resolve(FieldKey::PricePerBundle, sources.all(FieldKey::PricePerBundle), parse_price);
    let price_per_box = first_present([
        reconciler.resolve(FieldKey::PricePerBox, sources.all(FieldKey::PricePerBox), parse_price),
        price_range.and_then(|range| range.high),
    ]);

    let routed = sources
        .text(FieldKey::Packaging)
        .map(|label| route_packaging(&label))
        .unwrap_or_default();
    let bundle_quantity = first_present([
        reconciler.resolve(FieldKey::BundleQuantity, sources.all(FieldKey::BundleQuantity), count),
        routed.bundle_quantity,
    ]);
    let box_quantity = first_present([
        reconciler.resolve(FieldKey::BoxQuantity, sources.all(FieldKey::BoxQuantity), count),
        routed.box_quantity,
    ]);

    let stock_status = sources
        .text(FieldKey::StockStatus)
        .map(|label| StockStatus::from_label(&label))
        .unwrap_or_default();
    let rating = reconciler.resolve(FieldKey::Rating, sources.all(FieldKey::Rating), non_negative_decimal);
    let review_count = reconciler.resolve(FieldKey::ReviewCount, sources.all(FieldKey::ReviewCount), count);

    let record = CanonicalRecord {
        source_name,
        url,
        scraped_at,
        product_name,
        brand,
        length_inches,
        ring_gauge,
        shape,
        wrapper_color,
        wrapper_leaf,
        wrapper_origin_country,
        binder: sources.text(FieldKey::Binder),
        filler: sources.text(FieldKey::Filler),
        country_of_origin: sources.text(FieldKey::CountryOfOrigin),
        price_per_unit,
        price_per_bundle,
        bundle_quantity,
        price_per_box,
        box_quantity,
        stock_status,
        rating,
        review_count,
        strength_or_profile: sources.text(FieldKey::Strength),
        notes: assemble_notes(&sources),
    };

    Ok(AssembledRecord {
        record,
        parse_failures: reconciler.into_failures(),
    })
}

/// Summary, then description, then auxiliary metadata, each as its own paragraph.
fn assemble_notes(sources: &Sources<'_>) -> Option<String> {
    let clean = |raw: &str| to_clean_string(&collapse_whitespace(raw));
    let mut parts: Vec<String> = Vec::new();
    parts.extend(first_present(sources.all(FieldKey::Summary).map(clean)));
    parts.extend(first_present(sources.all(FieldKey::Description).map(clean)));
    parts.extend(sources.all(FieldKey::AuxNotes).filter_map(clean));
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
