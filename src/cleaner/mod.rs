//! Batched LLM cleaning of raw retail names into short catalog search terms.
//!
//! Raw feed names carry pack sizes and spec lists ("..., 5.9 oz, 5-pack")
//! that poison catalog search. Each batch goes out as one numbered list and
//! must come back as a strict JSON array in the same order; a malformed or
//! miscounted reply fails that batch only, and its products keep whatever
//! cleaned name they already had.

use anyhow::{bail, Context, Result};
use tracing::{error, info, instrument, warn};

use crate::config::CleaningConfig;
use crate::db::store::{ProductRecord, Store};
use crate::llm::{extract_json, openai::ChatClient};

const SYSTEM_PROMPT: &str =
    "You are an expert at optimizing product names for e-commerce search. Return ONLY valid JSON.";

#[derive(Debug, Default)]
pub struct CleaningSummary {
    pub cleaned: usize,
    pub failed_batches: usize,
}

pub struct Cleaner<'a> {
    chat: &'a ChatClient,
    store: &'a Store,
    config: CleaningConfig,
}

impl<'a> Cleaner<'a> {
    pub fn new(chat: &'a ChatClient, store: &'a Store, config: CleaningConfig) -> Self {
        Self {
            chat,
            store,
            config,
        }
    }

    /// Clean every product that has no cleaned name yet.
    #[instrument(skip(self))]
    pub async fn clean_pending(&self) -> Result<CleaningSummary> {
        let pending = self
            .store
            .get_products_missing_cleaned_name()
            .await
            .context("Failed to load products pending cleaning")?;

        if pending.is_empty() {
            info!("All products already have cleaned names");
            return Ok(CleaningSummary::default());
        }

        info!(count = pending.len(), "Cleaning product names");
        let mut summary = CleaningSummary::default();

        for batch in pending.chunks(self.config.batch_size) {
            match self.clean_batch(batch).await {
                Ok(cleaned) => summary.cleaned += cleaned,
                Err(e) => {
                    error!(batch_size = batch.len(), error = %e, "Batch cleaning failed");
                    summary.failed_batches += 1;
                }
            }
        }

        info!(
            cleaned = summary.cleaned,
            failed_batches = summary.failed_batches,
            "Cleaning complete"
        );
        Ok(summary)
    }

    async fn clean_batch(&self, batch: &[ProductRecord]) -> Result<usize> {
        let prompt = build_prompt(batch, self.config.max_name_len);
        let response = self.chat.complete(SYSTEM_PROMPT, &prompt).await?;

        let json = extract_json(&response.text)
            .with_context(|| format!("No JSON array in cleaning reply: {}", truncated(&response.text)))?;
        let cleaned_names: Vec<String> =
            serde_json::from_str(&json).context("Cleaning reply was not a JSON string array")?;

        if cleaned_names.len() != batch.len() {
            bail!(
                "Cleaning reply count mismatch: sent {}, got {}",
                batch.len(),
                cleaned_names.len()
            );
        }

        let mut cleaned = 0;
        for (product, name) in batch.iter().zip(cleaned_names) {
            let name = name.trim();
            if name.is_empty() {
                warn!(sku = %product.sku, "Empty cleaned name, keeping original");
                continue;
            }
            let id = product
                .id
                .with_context(|| format!("Product {} has no row id", product.sku))?;
            self.store
                .update_cleaned_name(id, name)
                .await
                .with_context(|| format!("Failed to store cleaned name for {}", product.sku))?;
            cleaned += 1;
        }
        Ok(cleaned)
    }
}

fn build_prompt(batch: &[ProductRecord], max_name_len: usize) -> String {
    let product_list = batch
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Clean these warehouse-club product names for marketplace catalog search.

RULES:
1. Remove pack sizes and count qualifiers (5-pack, 8-count, etc.)
2. Remove detailed specifications after commas
3. Keep brand + core product name + key differentiator
4. Max {max_name_len} characters
5. Focus on what makes the product findable in a marketplace search

Examples:
BAD:  "Crest Pro Health Advanced Toothpaste, 5.9 oz, 5-pack"
GOOD: "Crest Pro Health Advanced Toothpaste"

BAD:  "Dyson V15 Detect Total Clean Extra Cordless Stick Vacuum"
GOOD: "Dyson V15 Detect Cordless Vacuum"

BAD:  "MacBook Air Laptop (13-inch) - Apple M4 chip, 10-core CPU, 16GB Memory, 256GB SSD Storage"
GOOD: "MacBook Air 13 inch M4 16GB 256GB"

Products to clean:
{product_list}

Return ONLY a JSON array with cleaned names in the same order. No markdown, no explanation.
["cleaned name 1", "cleaned name 2", ...]"#
    )
}

fn truncated(text: &str) -> String {
    text.chars().take(200).collect()
}
