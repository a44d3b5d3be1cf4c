//! Monetary amounts from free-form price text.
//!
//! Only numbers with exactly two decimal places count as money, which keeps
//! quantities ("Box of 20") and SKU numbers out of the price fields.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex must compile"));

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: Option<f64>,
}

/// All two-decimal amounts in order of appearance.
pub fn price_amounts(text: &str) -> Vec<f64> {
    let cleaned = text.replace(',', "");
    NUMBER
        .find_iter(&cleaned)
        .map(|m| m.as_str())
        .filter(|token| {
            token
                .split_once('.')
                .is_some_and(|(_, decimals)| decimals.len() == 2)
        })
        .filter_map(|token| token.parse::<f64>().ok())
        .collect()
}

/// Primary price: the first amount, which is the low end of a "$8.53 - $10.89" range.
pub fn parse_price(text: &str) -> Option<f64> {
    price_amounts(text).first().copied()
}

/// Low and (when present) high bound of a price range.
pub fn parse_price_range(text: &str) -> Option<PriceRange> {
    let amounts = price_amounts(text);
    let low = *amounts.first()?;
    Some(PriceRange {
        low,
        high: amounts.get(1).copied(),
    })
}
