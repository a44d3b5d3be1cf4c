//! Canonical cigar record model and the normalization layer that produces it.
//!
//! Extractors hand over raw candidate strings keyed by [`FieldKey`]; everything
//! in this crate is pure and synchronous so the same raw input always yields the
//! same [`CanonicalRecord`] apart from `scraped_at`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod assemble;
pub mod coerce;
pub mod dimensions;
pub mod price;
pub mod reconcile;
pub mod wrapper;

pub use assemble::{assemble_record, route_packaging, AssembleError, AssembledRecord, AssemblyOptions, PackagingQuantities};
pub use dimensions::{parse_dimensions, parse_length, parse_ring_gauge, Dimensions};
pub use price::{parse_price, parse_price_range, PriceRange};
pub use reconcile::{first_present, ParseFailure, Reconciler};
pub use wrapper::{decompose_wrapper, WrapperParts};

/// Canonical field a raw candidate string contributes to.
///
/// Some keys are inputs to derived fields rather than record fields themselves
/// (`Size`, `Wrapper`, `PriceRange`, `Packaging`, `Summary`, `AuxNotes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    ProductName,
    Brand,
    Size,
    Length,
    RingGauge,
    Shape,
    Wrapper,
    WrapperColor,
    WrapperLeaf,
    WrapperOrigin,
    Binder,
    Filler,
    CountryOfOrigin,
    PricePerUnit,
    PricePerBundle,
    PricePerBox,
    PriceRange,
    Packaging,
    BundleQuantity,
    BoxQuantity,
    StockStatus,
    Rating,
    ReviewCount,
    Strength,
    Summary,
    Description,
    AuxNotes,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductName => "product_name",
            Self::Brand => "brand",
            Self::Size => "size",
            Self::Length => "length",
            Self::RingGauge => "ring_gauge",
            Self::Shape => "shape",
            Self::Wrapper => "wrapper",
            Self::WrapperColor => "wrapper_color",
            Self::WrapperLeaf => "wrapper_leaf",
            Self::WrapperOrigin => "wrapper_origin",
            Self::Binder => "binder",
            Self::Filler => "filler",
            Self::CountryOfOrigin => "country_of_origin",
            Self::PricePerUnit => "price_per_unit",
            Self::PricePerBundle => "price_per_bundle",
            Self::PricePerBox => "price_per_box",
            Self::PriceRange => "price_range",
            Self::Packaging => "packaging",
            Self::BundleQuantity => "bundle_quantity",
            Self::BoxQuantity => "box_quantity",
            Self::StockStatus => "stock_status",
            Self::Rating => "rating",
            Self::ReviewCount => "review_count",
            Self::Strength => "strength",
            Self::Summary => "summary",
            Self::Description => "description",
            Self::AuxNotes => "aux_notes",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered raw candidates per field. Insertion order within a key is precedence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFields(BTreeMap<FieldKey, Vec<String>>);

impl RawFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate; blank strings are absent and are not stored.
    pub fn push(&mut self, key: FieldKey, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.0.entry(key).or_default().push(value);
        }
        self
    }

    pub fn push_opt<S: Into<String>>(&mut self, key: FieldKey, value: Option<S>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn with(mut self, key: FieldKey, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn get(&self, key: FieldKey) -> &[String] {
        self.0.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, key: FieldKey) -> Option<&str> {
        self.get(key).first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.0.keys().copied()
    }
}

/// One product card discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListingItem {
    pub url: String,
    pub fields: RawFields,
}

impl RawListingItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fields: RawFields::new(),
        }
    }
}

/// Raw candidates scraped from one detail page. Lives for one traversal iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub fields: RawFields,
}

impl RawItem {
    pub fn new(fields: RawFields) -> Self {
        Self { fields }
    }
}

/// Availability as reported by the source. Free text survives as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
    Other(String),
}

/// Checked before "in stock" so negated labels are not read as available.
const OUT_OF_STOCK_MARKERS: [&str; 6] = [
    "out of stock",
    "sold out",
    "not in stock",
    "no longer in stock",
    "unavailable",
    "not available",
];

impl StockStatus {
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        let lower = trimmed.to_ascii_lowercase();
        if trimmed.is_empty() || lower == "unknown" {
            Self::Unknown
        } else if OUT_OF_STOCK_MARKERS.iter().any(|marker| lower.contains(marker)) {
            Self::OutOfStock
        } else if lower.contains("in stock") {
            Self::InStock
        } else {
            Self::Other(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InStock => "In Stock",
            Self::OutOfStock => "Out of Stock",
            Self::Unknown => "Unknown",
            Self::Other(text) => text,
        }
    }
}

impl From<String> for StockStatus {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<StockStatus> for String {
    fn from(value: StockStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified, source-independent observation of one cigar product.
///
/// Built once by [`assemble_record`] and never mutated afterwards; a re-scrape of
/// the same URL produces a new record with a new `scraped_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub source_name: String,
    pub url: String,
    pub scraped_at: NaiveDate,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub length_inches: Option<f64>,
    pub ring_gauge: Option<u32>,
    pub shape: Option<String>,
    pub wrapper_color: Option<String>,
    pub wrapper_leaf: Option<String>,
    pub wrapper_origin_country: Option<String>,
    pub binder: Option<String>,
    pub filler: Option<String>,
    pub country_of_origin: Option<String>,
    pub price_per_unit: Option<f64>,
    pub price_per_bundle: Option<f64>,
    pub bundle_quantity: Option<u32>,
    pub price_per_box: Option<f64>,
    pub box_quantity: Option<u32>,
    pub stock_status: StockStatus,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub strength_or_profile: Option<String>,
    pub notes: Option<String>,
}

impl CanonicalRecord {
    /// Sink key: one row per url per scrape date.
    pub fn record_key(&self) -> String {
        format!("{}@{}", self.url, self.scraped_at)
    }
}
