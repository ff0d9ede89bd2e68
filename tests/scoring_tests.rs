//! Scoring behavior across the profit calculator and opportunity validator.

use arbscout::catalog::Listing;
use arbscout::config::{ProfitConfig, ValidationConfig};
use arbscout::db::store::ProductStatus;
use arbscout::scoring::{self, profit::calculate_profit, validate::status_for};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn profit_config() -> ProfitConfig {
    ProfitConfig {
        referral_rate: dec!(0.15),
    }
}

fn validation_config() -> ValidationConfig {
    ValidationConfig::default()
}

fn listing(
    price: Option<Decimal>,
    rank: Option<i64>,
    offers: i64,
    history: Vec<Decimal>,
) -> Listing {
    Listing {
        asin: "B00SCORE".to_string(),
        title: "Scored Listing".to_string(),
        price,
        price_history: history,
        fulfillment_fees: dec!(3.00),
        sales_rank: rank,
        offer_count: offers,
        category: "Grocery".to_string(),
        pack_count: 1,
        weight_lbs: None,
        dimensions_in: None,
    }
}

// ──────────────────────────────────────────
// Profit math
// ──────────────────────────────────────────

#[test]
fn twenty_cost_forty_five_sale_three_fees() {
    let breakdown = calculate_profit(
        Some(dec!(20.00)),
        Some(dec!(45.00)),
        dec!(3.00),
        dec!(0.15),
    );
    assert_eq!(breakdown.profit, Some(dec!(15.25)));
    assert_eq!(breakdown.roi, Some(dec!(76.25)));
}

#[test]
fn undefined_inputs_never_produce_zero_profit() {
    for (cost, sale) in [
        (None, Some(dec!(45.00))),
        (Some(dec!(20.00)), None),
        (None, None),
        (Some(Decimal::ZERO), Some(dec!(45.00))),
    ] {
        let breakdown = calculate_profit(cost, sale, dec!(3.00), dec!(0.15));
        assert_eq!(breakdown.profit, None);
        assert_eq!(breakdown.roi, None);
    }
}

// ──────────────────────────────────────────
// Validator scenarios
// ──────────────────────────────────────────

#[test]
fn hot_seller_with_strong_profit_is_profitable() {
    // rank 5k, $60 sale off $20 cost, 6 offers, stable 12-sample history
    let history = vec![dec!(60.00); 12];
    let listing = listing(Some(dec!(60.00)), Some(5_000), 6, history);
    let score = scoring::score(
        Some(dec!(20.00)),
        &listing,
        &profit_config(),
        &validation_config(),
    );

    assert!(score.confidence >= 80);
    assert_eq!(score.status, ProductStatus::Profitable);
    assert!(score.is_valid());
}

#[test]
fn no_rank_no_profit_one_offer_is_skip() {
    let listing = listing(None, None, 1, vec![]);
    let score = scoring::score(
        Some(dec!(20.00)),
        &listing,
        &profit_config(),
        &validation_config(),
    );

    assert!(score.confidence <= 10);
    assert_eq!(score.status, ProductStatus::Skip);
    assert!(!score.is_valid());
}

#[test]
fn short_history_skips_the_stability_layer() {
    let nine_samples = vec![dec!(30.00); 9];
    let with_short = scoring::score(
        Some(dec!(10.00)),
        &listing(Some(dec!(30.00)), Some(5_000), 5, nine_samples),
        &profit_config(),
        &validation_config(),
    );
    // Only three layers contribute.
    assert_eq!(with_short.signals.len(), 3);

    let ten_samples = vec![dec!(30.00); 10];
    let with_full = scoring::score(
        Some(dec!(10.00)),
        &listing(Some(dec!(30.00)), Some(5_000), 5, ten_samples),
        &profit_config(),
        &validation_config(),
    );
    assert_eq!(with_full.signals.len(), 4);
}

#[test]
fn volatile_price_costs_confidence() {
    let mut history = vec![dec!(25.00); 11];
    history.push(dec!(70.00));
    let volatile = scoring::score(
        Some(dec!(15.00)),
        &listing(Some(dec!(70.00)), Some(5_000), 6, history),
        &profit_config(),
        &validation_config(),
    );

    let stable = scoring::score(
        Some(dec!(15.00)),
        &listing(Some(dec!(70.00)), Some(5_000), 6, vec![dec!(70.00); 12]),
        &profit_config(),
        &validation_config(),
    );

    assert!(volatile.confidence < stable.confidence);
}

#[test]
fn confidence_is_always_clamped() {
    // Every layer positive would exceed 100 unclamped.
    let best = scoring::score(
        Some(dec!(10.00)),
        &listing(Some(dec!(99.00)), Some(100), 20, vec![dec!(99.00); 50]),
        &profit_config(),
        &validation_config(),
    );
    assert!(best.confidence <= 100);

    // Every layer negative would go below zero unclamped.
    let worst = scoring::score(None, &listing(None, Some(9_999_999), 0, vec![]), &profit_config(), &validation_config());
    assert_eq!(worst.confidence, 0);
}

#[test]
fn status_is_monotonic_in_confidence() {
    let order = |s: ProductStatus| match s {
        ProductStatus::Profitable => 3,
        ProductStatus::Potential => 2,
        ProductStatus::Risky => 1,
        _ => 0,
    };
    let config = validation_config();
    let mut last = order(status_for(0, &config));
    for confidence in 1..=100u8 {
        let current = order(status_for(confidence, &config));
        assert!(current >= last, "status regressed at confidence {confidence}");
        last = current;
    }
}
