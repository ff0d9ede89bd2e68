//! Decides which products a matching cycle works on, and in what order.
//!
//! Priority: manually overridden products first, then never-matched ones,
//! then previously processed products whose data has gone stale, cheapest
//! confidence first so shaky matches get re-checked soonest.

use chrono::{DateTime, Duration, Utc};

use crate::config::SchedulerConfig;
use crate::db::store::{ProductRecord, ProductStatus};

pub fn select_batch(
    products: Vec<ProductRecord>,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Vec<ProductRecord> {
    let cutoff = now - Duration::days(config.stale_days);

    let mut overrides = Vec::new();
    let mut unmatched = Vec::new();
    let mut stale = Vec::new();

    for product in products {
        if product.override_asin.is_some() {
            overrides.push(product);
        } else if product.status() == ProductStatus::New {
            unmatched.push(product);
        } else {
            // A missing timestamp means we cannot prove freshness, so re-check.
            let is_stale = match product.last_updated() {
                Some(updated) => updated < cutoff,
                None => true,
            };
            if is_stale {
                stale.push(product);
            }
        }
    }

    stale.sort_by_key(|p| {
        (
            p.confidence.unwrap_or(0),
            p.last_updated().unwrap_or(DateTime::<Utc>::MIN_UTC),
            p.id,
        )
    });

    let mut batch = overrides;
    batch.append(&mut unmatched);
    batch.append(&mut stale);
    batch.truncate(config.batch_size);
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::new_product;

    fn config(stale_days: i64, batch_size: usize) -> SchedulerConfig {
        SchedulerConfig {
            stale_days,
            batch_size,
        }
    }

    fn product(sku: &str) -> ProductRecord {
        new_product(sku.to_string(), format!("Product {sku}"), None, None, None, true)
    }

    fn matched(sku: &str, confidence: i64, updated_days_ago: i64, now: DateTime<Utc>) -> ProductRecord {
        let mut p = product(sku);
        p.status = ProductStatus::Potential.to_string();
        p.confidence = Some(confidence);
        p.last_updated = Some((now - Duration::days(updated_days_ago)).to_rfc3339());
        p
    }

    #[test]
    fn test_overrides_come_first() {
        let now = Utc::now();
        let mut pinned = matched("100", 95, 1, now);
        pinned.override_asin = Some("B000PINNED".to_string());
        let fresh = product("200");

        let batch = select_batch(vec![fresh, pinned], &config(14, 50), now);
        assert_eq!(batch[0].sku, "100");
        assert_eq!(batch[1].sku, "200");
    }

    #[test]
    fn test_fresh_matches_are_skipped() {
        let now = Utc::now();
        let fresh_match = matched("100", 80, 2, now);
        let stale_match = matched("200", 80, 20, now);

        let batch = select_batch(vec![fresh_match, stale_match], &config(14, 50), now);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].sku, "200");
    }

    #[test]
    fn test_stale_ordered_by_ascending_confidence_then_age() {
        let now = Utc::now();
        let high = matched("100", 90, 20, now);
        let low = matched("200", 45, 20, now);
        let low_older = matched("300", 45, 30, now);

        let batch = select_batch(vec![high, low, low_older], &config(14, 50), now);
        let skus: Vec<&str> = batch.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["300", "200", "100"]);
    }

    #[test]
    fn test_missing_timestamp_counts_as_stale() {
        let now = Utc::now();
        let mut undated = matched("100", 70, 1, now);
        undated.last_updated = None;

        let batch = select_batch(vec![undated], &config(14, 50), now);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_batch_cap_truncates() {
        let now = Utc::now();
        let products: Vec<ProductRecord> = (0..10).map(|i| product(&i.to_string())).collect();
        let batch = select_batch(products, &config(14, 3), now);
        assert_eq!(batch.len(), 3);
    }
}
