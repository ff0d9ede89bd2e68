//! Retail deals feed ingestion.
//!
//! Pulls the warehouse-club search feed page by page, parses the loosely
//! shaped docs, and inserts anything not already in the store as a `New`
//! product. A bad doc or a failed insert is counted, never fatal.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::config::IngestConfig;
use crate::db::store::{new_product, PriceHistoryRecord, ProductRecord, Store};

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub fetched: usize,
    pub saved: usize,
    pub price_updates: usize,
    pub skipped: usize,
    pub errors: usize,
}

enum SaveResult {
    Inserted,
    PriceUpdated,
    Duplicate,
}

pub struct Ingestor<'a> {
    http: reqwest::Client,
    store: &'a Store,
    config: IngestConfig,
    api_key: Option<String>,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a Store, config: IngestConfig, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            store,
            config,
            api_key,
        })
    }

    /// Fetch up to `max_products` deals and store the ones we have not seen.
    #[instrument(skip(self))]
    pub async fn run(&self, max_products: u32) -> Result<IngestSummary> {
        let docs = self.fetch_deals(max_products).await;
        let mut summary = IngestSummary {
            fetched: docs.len(),
            ..Default::default()
        };

        for doc in docs {
            match self.save_doc(&doc).await {
                Ok(SaveResult::Inserted) => summary.saved += 1,
                Ok(SaveResult::PriceUpdated) => summary.price_updates += 1,
                Ok(SaveResult::Duplicate) => summary.skipped += 1,
                Err(e) => {
                    error!(error = %e, "Failed to save feed product");
                    summary.errors += 1;
                }
            }
        }

        info!(
            fetched = summary.fetched,
            saved = summary.saved,
            price_updates = summary.price_updates,
            skipped = summary.skipped,
            errors = summary.errors,
            "Ingest complete"
        );
        Ok(summary)
    }

    async fn fetch_deals(&self, max_products: u32) -> Vec<FeedDoc> {
        let mut docs = Vec::new();
        let mut start = 0u32;

        while start < max_products {
            let rows = self.config.page_size.min(max_products - start);
            match self.fetch_page(start, rows).await {
                Ok(page) => {
                    let short_page = (page.len() as u32) < rows;
                    info!(start, fetched = page.len(), "Fetched feed page");
                    docs.extend(page);
                    if short_page {
                        break;
                    }
                }
                Err(e) => {
                    // Keep whatever earlier pages produced.
                    warn!(start, error = %e, "Feed page fetch failed");
                    break;
                }
            }
            start += rows;
        }
        docs
    }

    async fn fetch_page(&self, start: u32, rows: u32) -> Result<Vec<FeedDoc>> {
        let mut request = self
            .http
            .get(&self.config.feed_url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .query(&[
                ("expoption", "lucidworks"),
                ("q", "OFF"),
                ("locale", "en-US"),
                ("start", &start.to_string()),
                ("rows", &rows.to_string()),
                ("sort", "item_page_views desc"),
            ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.context("Feed request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Feed returned {}", status);
        }

        let feed: FeedResponse = response.json().await.context("Failed to parse feed page")?;
        Ok(feed.response.docs)
    }

    async fn save_doc(&self, doc: &FeedDoc) -> Result<SaveResult> {
        let product = parse_doc(doc).context("Feed doc missing name or sku")?;

        if let Some(existing) = self.store.find_by_sku(&product.sku).await? {
            return self.reconcile_price(&existing, &product).await;
        }
        self.store
            .insert_product(&product)
            .await
            .with_context(|| format!("Insert failed for sku {}", product.sku))?;
        Ok(SaveResult::Inserted)
    }

    /// A duplicate SKU carries a fresh cost snapshot. Any price change is
    /// written through and recorded in the append-only history.
    async fn reconcile_price(
        &self,
        existing: &ProductRecord,
        fresh: &ProductRecord,
    ) -> Result<SaveResult> {
        let fresh_price = match fresh.cost_price() {
            Some(price) => price,
            None => return Ok(SaveResult::Duplicate),
        };
        let old_price = existing.cost_price();
        if old_price == Some(fresh_price) {
            return Ok(SaveResult::Duplicate);
        }

        let id = existing
            .id
            .with_context(|| format!("Product {} has no row id", existing.sku))?;
        self.store.update_cost_price(id, fresh_price).await?;
        self.store
            .insert_price_history(&PriceHistoryRecord {
                id: None,
                product_id: id,
                sku: existing.sku.clone(),
                old_price: old_price.map(|p| p.to_string()),
                new_price: fresh_price.to_string(),
                created_at: None,
            })
            .await?;

        info!(
            sku = %existing.sku,
            old = ?old_price,
            new = %fresh_price,
            "Cost price changed"
        );
        Ok(SaveResult::PriceUpdated)
    }
}

/// One raw product doc from the deals feed. Everything is optional.
#[derive(Debug, Deserialize)]
pub struct FeedDoc {
    #[serde(default)]
    item_product_name: Option<String>,
    #[serde(default)]
    item_number: Option<SkuField>,
    #[serde(default, rename = "item_location_pricing_salePrice")]
    sale_price: Option<f64>,
    #[serde(default, rename = "item_location_pricing_listPrice")]
    list_price: Option<f64>,
    #[serde(default)]
    item_location_availability: Option<String>,
    #[serde(default, rename = "Brand_attr")]
    brand_attr: Option<Vec<String>>,
    #[serde(default)]
    item_product_marketing_statement: Option<String>,
}

/// The feed is inconsistent about whether item numbers are strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkuField {
    Text(String),
    Number(i64),
}

impl SkuField {
    fn as_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    response: FeedResponseInner,
}

#[derive(Debug, Deserialize)]
struct FeedResponseInner {
    #[serde(default)]
    docs: Vec<FeedDoc>,
}

/// Turn a feed doc into an insertable `New` product.
/// `None` when the doc lacks a usable name or item number.
pub fn parse_doc(doc: &FeedDoc) -> Option<ProductRecord> {
    let name = doc.item_product_name.as_deref()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let sku = doc.item_number.as_ref()?.as_string();
    if sku.trim().is_empty() {
        return None;
    }

    let sale_price = doc.sale_price.and_then(|p| Decimal::try_from(p).ok());
    let mut list_price = doc.list_price.and_then(|p| Decimal::try_from(p).ok());

    // List price is often absent; reconstruct it from the discount statement.
    if list_price.is_none() {
        if let (Some(sale), Some(discount)) = (
            sale_price,
            doc.item_product_marketing_statement
                .as_deref()
                .and_then(parse_discount),
        ) {
            list_price = Some(sale + discount);
        }
    }

    let in_stock = doc
        .item_location_availability
        .as_deref()
        .map(|a| a == "in stock")
        .unwrap_or(false);
    let brand = doc
        .brand_attr
        .as_ref()
        .and_then(|brands| brands.first())
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());

    Some(new_product(sku, name, brand, sale_price, list_price, in_stock))
}

/// Extract a dollar amount from a marketing statement like "$30 OFF".
fn parse_discount(statement: &str) -> Option<Decimal> {
    if !statement.contains("OFF") {
        return None;
    }
    let after_dollar = &statement[statement.find('$')? + 1..];
    let amount: String = after_dollar
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    amount.parse().ok()
}
