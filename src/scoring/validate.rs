//! Multi-signal opportunity validation.
//!
//! Starts from a neutral confidence of 50 and adjusts it layer by layer:
//! sales velocity, profit margin, competition, and price stability. Each
//! layer records one human-readable signal explaining its contribution.

use rust_decimal::Decimal;

use crate::catalog::Listing;
use crate::config::ValidationConfig;
use crate::db::store::ProductStatus;

const BASELINE: i32 = 50;

#[derive(Debug, Clone)]
pub struct Verdict {
    pub confidence: u8,
    pub status: ProductStatus,
    pub signals: Vec<String>,
}

pub fn validate_opportunity(
    listing: &Listing,
    profit: Option<Decimal>,
    config: &ValidationConfig,
) -> Verdict {
    let mut confidence = BASELINE;
    let mut signals = Vec::new();

    confidence += rank_layer(listing.sales_rank, config, &mut signals);
    confidence += profit_layer(profit, config, &mut signals);
    confidence += offers_layer(listing.offer_count, config, &mut signals);
    confidence += stability_layer(listing, config, &mut signals);

    let confidence = confidence.clamp(0, 100) as u8;

    Verdict {
        confidence,
        status: status_for(confidence, config),
        signals,
    }
}

/// Step function over the final confidence score.
pub fn status_for(confidence: u8, config: &ValidationConfig) -> ProductStatus {
    if confidence >= config.status_profitable {
        ProductStatus::Profitable
    } else if confidence >= config.status_potential {
        ProductStatus::Potential
    } else if confidence >= config.status_risky {
        ProductStatus::Risky
    } else {
        ProductStatus::Skip
    }
}

fn rank_layer(sales_rank: Option<i64>, config: &ValidationConfig, signals: &mut Vec<String>) -> i32 {
    match sales_rank {
        Some(rank) if rank < config.rank_excellent => {
            signals.push(format!("hot seller (rank {rank})"));
            25
        }
        Some(rank) if rank < config.rank_good => {
            signals.push(format!("good sales (rank {rank})"));
            15
        }
        Some(rank) if rank < config.rank_poor => {
            signals.push(format!("moderate sales (rank {rank})"));
            5
        }
        Some(rank) => {
            signals.push(format!("slow seller (rank {rank})"));
            -20
        }
        None => {
            signals.push("no sales rank data".to_string());
            -10
        }
    }
}

fn profit_layer(profit: Option<Decimal>, config: &ValidationConfig, signals: &mut Vec<String>) -> i32 {
    match profit {
        Some(profit) if profit >= config.profit_excellent => {
            signals.push(format!("excellent profit (${profit})"));
            20
        }
        Some(profit) if profit >= config.profit_good => {
            signals.push(format!("good profit (${profit})"));
            15
        }
        Some(profit) if profit >= config.min_profit => {
            signals.push(format!("decent profit (${profit})"));
            10
        }
        Some(profit) => {
            signals.push(format!("low profit (${profit})"));
            -30
        }
        None => {
            signals.push("no profit data".to_string());
            -40
        }
    }
}

fn offers_layer(offer_count: i64, config: &ValidationConfig, signals: &mut Vec<String>) -> i32 {
    if offer_count >= config.many_offers {
        signals.push(format!("multiple sellers ({offer_count})"));
        10
    } else if offer_count >= config.min_offers {
        signals.push(format!("few sellers ({offer_count})"));
        5
    } else {
        signals.push(format!("limited sellers ({offer_count})"));
        -15
    }
}

/// Only contributes when there is enough history to say anything; with a
/// short history or no current price the layer abstains entirely.
fn stability_layer(listing: &Listing, config: &ValidationConfig, signals: &mut Vec<String>) -> i32 {
    let price = match listing.price {
        Some(price) => price,
        None => return 0,
    };
    if listing.price_history.len() < config.stability_min_history {
        return 0;
    }

    let sum: Decimal = listing.price_history.iter().sum();
    let avg = sum / Decimal::from(listing.price_history.len() as i64);
    if avg <= Decimal::ZERO {
        return 0;
    }
    let variance = ((price - avg) / avg).abs();

    if variance < config.stable_band {
        signals.push(format!("stable price (${price})"));
        10
    } else if variance < config.loose_band {
        signals.push(format!("price varies (${price} vs avg ${})", avg.round_dp(2)));
        5
    } else {
        signals.push(format!("volatile price (${price} vs avg ${})", avg.round_dp(2)));
        -15
    }
}
