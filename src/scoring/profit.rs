//! Arbitrage profit math. Decimal throughout, rounded to cents at the edge.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const PERCENT: Decimal = dec!(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitBreakdown {
    pub profit: Option<Decimal>,
    pub roi: Option<Decimal>,
}

impl ProfitBreakdown {
    pub const UNDEFINED: Self = Self {
        profit: None,
        roi: None,
    };
}

/// Profit = sale − cost − fulfillment fees − marketplace referral cut.
/// ROI is profit over cost, as a percentage. Missing or non-positive
/// cost/sale price means the numbers are undefined, not zero.
pub fn calculate_profit(
    cost_price: Option<Decimal>,
    sale_price: Option<Decimal>,
    fulfillment_fees: Decimal,
    referral_rate: Decimal,
) -> ProfitBreakdown {
    let (cost, sale) = match (cost_price, sale_price) {
        (Some(cost), Some(sale)) if cost > Decimal::ZERO && sale > Decimal::ZERO => (cost, sale),
        _ => return ProfitBreakdown::UNDEFINED,
    };

    let referral = sale * referral_rate;
    let profit = sale - cost - fulfillment_fees - referral;
    let roi = profit / cost * PERCENT;

    ProfitBreakdown {
        profit: Some(profit.round_dp(2)),
        roi: Some(roi.round_dp(2)),
    }
}
