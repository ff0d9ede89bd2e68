//! Pure conversion from raw catalog records to domain listings.
//!
//! Each field has an explicit defaulting rule: prices are undefined (None)
//! without a positive sample in their time-series channel, ranks are
//! undefined unless the newest sample is positive, fees are additive and
//! default to zero, pack count defaults to 1.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::catalog::{Listing, RawProduct};

/// Time-series channel holding the buy-box new-condition price.
pub const PRICE_CHANNEL: usize = 1;
/// Time-series channel holding the demand rank.
pub const RANK_CHANNEL: usize = 3;

const CENTS_PER_DOLLAR: Decimal = dec!(100);
const GRAMS_PER_POUND: Decimal = dec!(453.592);
const HUNDREDTHS_PER_INCH: Decimal = dec!(100);

/// Convert a raw catalog record into a `Listing`.
/// Returns None when the record lacks an identifier or title — such records
/// cannot be matched or linked and are dropped at this boundary.
pub fn parse_listing(raw: &RawProduct) -> Option<Listing> {
    let asin = raw.asin.clone().filter(|a| !a.is_empty())?;
    let title = raw.title.clone().filter(|t| !t.is_empty())?;

    let price_samples: Vec<Decimal> = channel(raw, PRICE_CHANNEL)
        .map(|series| {
            series
                .iter()
                .filter(|v| **v > 0)
                .map(|v| Decimal::from(*v) / CENTS_PER_DOLLAR)
                .collect()
        })
        .unwrap_or_default();
    let price = price_samples.last().copied();

    let fulfillment_fees = raw
        .fba_fees
        .as_ref()
        .map(|fees| {
            let cents = fees.pick_and_pack_fee.unwrap_or(0) + fees.storage_fee.unwrap_or(0);
            Decimal::from(cents) / CENTS_PER_DOLLAR
        })
        .unwrap_or(Decimal::ZERO);

    // The rank series is only trusted at its newest sample: a non-positive
    // tail means the rank data went stale or the listing was delisted, and
    // an older positive sample must not resurrect it.
    let sales_rank = channel(raw, RANK_CHANNEL)
        .and_then(|series| series.last())
        .copied()
        .filter(|v| *v > 0);

    let category = raw
        .category_tree
        .first()
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let pack_count = raw.package_quantity.filter(|q| *q > 0).unwrap_or(1);

    let weight_lbs = raw
        .package_weight
        .filter(|g| *g > 0)
        .map(|g| Decimal::from(g) / GRAMS_PER_POUND);

    let dimensions_in = match (raw.package_length, raw.package_width, raw.package_height) {
        (Some(l), Some(w), Some(h)) if l > 0 && w > 0 && h > 0 => Some((
            Decimal::from(l) / HUNDREDTHS_PER_INCH,
            Decimal::from(w) / HUNDREDTHS_PER_INCH,
            Decimal::from(h) / HUNDREDTHS_PER_INCH,
        )),
        _ => None,
    };

    Some(Listing {
        asin,
        title,
        price,
        price_history: price_samples,
        fulfillment_fees,
        sales_rank,
        offer_count: raw.offer_count_fba.unwrap_or(0),
        category,
        pack_count,
        weight_lbs,
        dimensions_in,
    })
}

fn channel(raw: &RawProduct, index: usize) -> Option<&Vec<i64>> {
    raw.csv.get(index).and_then(|c| c.as_ref())
}
