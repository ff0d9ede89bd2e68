//! The matching cycle: schedule products, find and score their catalog
//! counterparts, persist the verdicts.
//!
//! Products are processed sequentially (the catalog client paces requests)
//! and failures are isolated per product: one bad product costs one error
//! tally, never the run.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::catalog::client::CatalogClient;
use crate::config::{ProfitConfig, SchedulerConfig, ValidationConfig};
use crate::db::store::{MatchFields, ProductRecord, ProductStatus, Store};
use crate::matcher::{MatchOutcome, MatchStrategy, OVERRIDE_CONFIDENCE};
use crate::scheduler;
use crate::scoring;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub run_id: String,
    pub processed: usize,
    pub matched: usize,
    pub not_found: usize,
    pub profitable: usize,
    pub potential: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOptions {
    /// Hard cap on products this cycle, on top of the scheduler's batch size.
    pub limit: Option<usize>,
    /// Abort before doing any work if the catalog budget cannot cover the batch.
    pub check_budget: bool,
}

enum ProcessOutcome {
    Matched(ProductStatus),
    NotFound,
}

pub struct Pipeline<'a> {
    store: &'a Store,
    catalog: &'a CatalogClient,
    strategy: &'a dyn MatchStrategy,
    profit_config: ProfitConfig,
    validation_config: ValidationConfig,
    scheduler_config: SchedulerConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a Store,
        catalog: &'a CatalogClient,
        strategy: &'a dyn MatchStrategy,
        profit_config: ProfitConfig,
        validation_config: ValidationConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            strategy,
            profit_config,
            validation_config,
            scheduler_config,
        }
    }

    #[instrument(skip(self, options))]
    pub async fn run_cycle(&self, options: CycleOptions) -> Result<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        let mut summary = RunSummary {
            run_id: run_id.clone(),
            ..Default::default()
        };

        let products = self
            .store
            .get_all_products()
            .await
            .context("Failed to load products for scheduling")?;
        let mut batch = scheduler::select_batch(products, &self.scheduler_config, Utc::now());
        if let Some(limit) = options.limit {
            batch.truncate(limit);
        }

        if batch.is_empty() {
            info!(run_id = %run_id, "Nothing to match");
            return Ok(summary);
        }

        if options.check_budget {
            self.ensure_budget(batch.len()).await?;
        }

        info!(run_id = %run_id, batch = batch.len(), "Starting matching cycle");

        for product in &batch {
            summary.processed += 1;
            match self.process(product).await {
                Ok(ProcessOutcome::Matched(status)) => {
                    summary.matched += 1;
                    match status {
                        ProductStatus::Profitable => summary.profitable += 1,
                        ProductStatus::Potential => summary.potential += 1,
                        _ => {}
                    }
                }
                Ok(ProcessOutcome::NotFound) => summary.not_found += 1,
                Err(e) => {
                    error!(run_id = %run_id, sku = %product.sku, error = %e, "Product failed");
                    summary.errors += 1;
                }
            }
        }

        info!(
            run_id = %run_id,
            processed = summary.processed,
            matched = summary.matched,
            not_found = summary.not_found,
            profitable = summary.profitable,
            potential = summary.potential,
            errors = summary.errors,
            "Matching cycle complete"
        );
        Ok(summary)
    }

    async fn ensure_budget(&self, needed: usize) -> Result<()> {
        let budget = self
            .catalog
            .budget()
            .await
            .context("Catalog budget check failed")?;
        if budget.tokens_left < needed as i64 {
            anyhow::bail!(
                "Insufficient catalog budget: {} tokens for {} products (refill in {}ms)",
                budget.tokens_left,
                needed,
                budget.refill_in_ms
            );
        }
        Ok(())
    }

    async fn process(&self, product: &ProductRecord) -> Result<ProcessOutcome> {
        let id = product
            .id
            .with_context(|| format!("Product {} has no row id", product.sku))?;

        let outcome = if let Some(asin) = product.override_asin.clone() {
            self.resolve_override(id, &asin).await?
        } else {
            let candidates = self
                .catalog
                .search(product.search_name(), product.brand.as_deref())
                .await
                .with_context(|| format!("Catalog search failed for {}", product.sku))?;
            if candidates.is_empty() {
                info!(sku = %product.sku, "No catalog results");
                self.store.set_status(id, ProductStatus::NotFound).await?;
                return Ok(ProcessOutcome::NotFound);
            }
            self.strategy.select(product, &candidates).await
        };

        match outcome {
            MatchOutcome::NoMatch => {
                self.store.set_status(id, ProductStatus::NotFound).await?;
                Ok(ProcessOutcome::NotFound)
            }
            MatchOutcome::Selected {
                listing,
                confidence,
                justification,
            } => {
                let score = scoring::score(
                    product.cost_price(),
                    &listing,
                    &self.profit_config,
                    &self.validation_config,
                );

                info!(
                    sku = %product.sku,
                    asin = %listing.asin,
                    match_confidence = confidence,
                    opportunity_confidence = score.confidence,
                    status = %score.status,
                    "Product matched"
                );

                let fields = MatchFields {
                    asin: Some(listing.asin.clone()),
                    sale_price: listing.price,
                    fulfillment_fees: Some(listing.fulfillment_fees),
                    sales_rank: listing.sales_rank,
                    category: Some(listing.category.clone()),
                    profit: score.profit,
                    roi: score.roi,
                    confidence: score.confidence as i64,
                    justification: Some(format!(
                        "{justification} (match confidence {confidence}%) | {}",
                        score.signals.join("; ")
                    )),
                    status: score.status.to_string(),
                };
                self.store.update_match(id, &fields).await?;
                Ok(ProcessOutcome::Matched(score.status))
            }
        }
    }

    /// A pinned listing bypasses search and judgment entirely. The pin is
    /// one-shot: it is consumed even when the fetch fails, so a bad ASIN
    /// cannot wedge the product at the front of every cycle.
    async fn resolve_override(&self, id: i64, asin: &str) -> Result<MatchOutcome> {
        let fetched = self.catalog.fetch_by_asin(asin).await;
        self.store.clear_override(id).await?;

        match fetched {
            Ok(Some(listing)) => Ok(MatchOutcome::selected(
                listing,
                OVERRIDE_CONFIDENCE,
                format!("Manually pinned to {asin}"),
            )),
            Ok(None) => Ok(MatchOutcome::NoMatch),
            Err(e) => Err(e).with_context(|| format!("Override fetch failed for {asin}")),
        }
    }
}
