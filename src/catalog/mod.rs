pub mod client;
pub mod parse;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Our domain representation of a marketplace candidate listing.
/// An immutable snapshot — a fresh retrieval produces a new value.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub asin: String,
    pub title: String,
    /// Latest buy-box price. None when the series has no positive sample.
    pub price: Option<Decimal>,
    /// Positive price samples, oldest first.
    pub price_history: Vec<Decimal>,
    /// Fulfillment fees. Missing fee data is additive-zero, never None.
    pub fulfillment_fees: Decimal,
    /// Demand rank, lower = faster-selling. None when absent or zero.
    pub sales_rank: Option<i64>,
    pub offer_count: i64,
    pub category: String,
    /// Units per package, defaults to 1.
    pub pack_count: i64,
    pub weight_lbs: Option<Decimal>,
    /// (length, width, height) in inches.
    pub dimensions_in: Option<(Decimal, Decimal, Decimal)>,
}

/// Remaining request budget reported by the catalog API.
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetStatus {
    #[serde(rename = "tokensLeft", default)]
    pub tokens_left: i64,
    /// Milliseconds until the next budget replenishment.
    #[serde(rename = "refillIn", default)]
    pub refill_in_ms: i64,
    #[serde(rename = "refillRate", default)]
    pub refill_rate: i64,
}

/// Raw search/lookup response envelope.
#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub products: Vec<RawProduct>,
    #[serde(rename = "tokensLeft", default)]
    pub tokens_left: Option<i64>,
}

/// Loosely-shaped catalog product record. Every field is optional and
/// defaulting rules live in `parse`, so ambiguity is rejected at this boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    pub asin: Option<String>,
    pub title: Option<String>,
    /// Time-series channels; index 1 = buy-box new price, index 3 = demand rank.
    /// Values are integer cents (prices) or raw ranks; non-positive = no data.
    #[serde(default)]
    pub csv: Vec<Option<Vec<i64>>>,
    pub fba_fees: Option<RawFees>,
    #[serde(rename = "offerCountFBA", default)]
    pub offer_count_fba: Option<i64>,
    #[serde(default)]
    pub category_tree: Vec<RawCategory>,
    pub package_quantity: Option<i64>,
    /// Grams.
    pub package_weight: Option<i64>,
    /// Hundredths of an inch.
    pub package_length: Option<i64>,
    pub package_width: Option<i64>,
    pub package_height: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFees {
    pub pick_and_pack_fee: Option<i64>,
    pub storage_fee: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCategory {
    pub name: Option<String>,
}
