//! Opportunity scoring: profit math plus multi-signal validation.

pub mod profit;
pub mod validate;

use rust_decimal::Decimal;

use crate::catalog::Listing;
use crate::config::{ProfitConfig, ValidationConfig};
use crate::db::store::ProductStatus;

/// Full scoring result for one matched listing.
#[derive(Debug, Clone)]
pub struct OpportunityScore {
    pub profit: Option<Decimal>,
    pub roi: Option<Decimal>,
    /// Clamped to 0..=100.
    pub confidence: u8,
    pub status: ProductStatus,
    pub signals: Vec<String>,
}

impl OpportunityScore {
    /// Worth persisting as an opportunity: at least `Potential` under the
    /// configured status steps.
    pub fn is_valid(&self) -> bool {
        matches!(
            self.status,
            ProductStatus::Profitable | ProductStatus::Potential
        )
    }
}

/// Score a matched listing against its source cost price.
pub fn score(
    cost_price: Option<Decimal>,
    listing: &Listing,
    profit_config: &ProfitConfig,
    validation_config: &ValidationConfig,
) -> OpportunityScore {
    let breakdown = profit::calculate_profit(
        cost_price,
        listing.price,
        listing.fulfillment_fees,
        profit_config.referral_rate,
    );
    let verdict = validate::validate_opportunity(listing, breakdown.profit, validation_config);

    OpportunityScore {
        profit: breakdown.profit,
        roi: breakdown.roi,
        confidence: verdict.confidence,
        status: verdict.status,
        signals: verdict.signals,
    }
}
