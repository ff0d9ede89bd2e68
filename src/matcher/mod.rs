//! Candidate selection: pick the catalog listing that is the same product
//! as the source item, or decide that none of them is.
//!
//! Two strategies behind one trait. The judged selector asks the LLM to
//! choose among enriched candidates and falls back to the deterministic
//! first-candidate strategy when the model misbehaves. Programmatic hard
//! rules (brand containment, declared pack count) veto any pick regardless
//! of the model's stated confidence.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::catalog::Listing;
use crate::config::MatchingConfig;
use crate::db::store::ProductRecord;
use crate::llm::{extract_json, openai::ChatClient};

const JUDGE_SYSTEM_PROMPT: &str =
    "You are an expert at matching retail products across marketplaces. Return ONLY valid JSON.";

/// Confidence assigned to a manually pinned listing.
pub const OVERRIDE_CONFIDENCE: u8 = 100;

#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Selected {
        listing: Listing,
        confidence: u8,
        justification: String,
    },
    NoMatch,
}

impl MatchOutcome {
    pub fn selected(listing: Listing, confidence: u8, justification: impl Into<String>) -> Self {
        Self::Selected {
            listing,
            confidence,
            justification: justification.into(),
        }
    }
}

#[async_trait]
pub trait MatchStrategy: Send + Sync {
    async fn select(&self, product: &ProductRecord, candidates: &[Listing]) -> MatchOutcome;
}

/// Deterministic baseline: trust the catalog's own relevance ranking and
/// take the first candidate at a fixed confidence.
pub struct FirstCandidate {
    confidence: u8,
}

impl FirstCandidate {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            confidence: config.fallback_confidence,
        }
    }
}

#[async_trait]
impl MatchStrategy for FirstCandidate {
    async fn select(&self, product: &ProductRecord, candidates: &[Listing]) -> MatchOutcome {
        let Some(listing) = candidates.first() else {
            return MatchOutcome::NoMatch;
        };
        if let Some(reason) = hard_reject(product, listing) {
            debug!(sku = %product.sku, reason = %reason, "First candidate rejected");
            return MatchOutcome::NoMatch;
        }
        MatchOutcome::selected(
            listing.clone(),
            self.confidence,
            "Top-ranked catalog search result",
        )
    }
}

/// LLM-judged selection over the full candidate list.
pub struct JudgedSelector<'a> {
    chat: &'a ChatClient,
    config: MatchingConfig,
    fallback: FirstCandidate,
}

impl<'a> JudgedSelector<'a> {
    pub fn new(chat: &'a ChatClient, config: MatchingConfig) -> Self {
        let fallback = FirstCandidate::new(&config);
        Self {
            chat,
            config,
            fallback,
        }
    }

    async fn judge(&self, product: &ProductRecord, candidates: &[Listing]) -> anyhow::Result<MatchOutcome> {
        let prompt = build_judge_prompt(product, candidates);
        let response = self.chat.complete(JUDGE_SYSTEM_PROMPT, &prompt).await?;

        let json = extract_json(&response.text)
            .ok_or_else(|| anyhow::anyhow!("No JSON object in judge reply"))?;
        let reply: JudgeReply = serde_json::from_str(&json)?;

        if reply.selected_index == 0 {
            info!(sku = %product.sku, "Judge found no acceptable candidate");
            return Ok(MatchOutcome::NoMatch);
        }
        let listing = candidates
            .get(reply.selected_index - 1)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Judge selected index {} out of {} candidates",
                    reply.selected_index,
                    candidates.len()
                )
            })?;

        let confidence = reply.confidence.min(100);
        if confidence < self.config.accept_threshold {
            info!(
                sku = %product.sku,
                confidence,
                threshold = self.config.accept_threshold,
                "Judged confidence below acceptance threshold"
            );
            return Ok(MatchOutcome::NoMatch);
        }
        if let Some(reason) = hard_reject(product, listing) {
            info!(sku = %product.sku, reason = %reason, "Judged pick vetoed by hard rule");
            return Ok(MatchOutcome::NoMatch);
        }

        Ok(MatchOutcome::selected(
            listing.clone(),
            confidence,
            reply.justification,
        ))
    }
}

#[async_trait]
impl MatchStrategy for JudgedSelector<'_> {
    #[instrument(skip(self, product, candidates), fields(sku = %product.sku))]
    async fn select(&self, product: &ProductRecord, candidates: &[Listing]) -> MatchOutcome {
        if candidates.is_empty() {
            return MatchOutcome::NoMatch;
        }
        match self.judge(product, candidates).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(sku = %product.sku, error = %e, "Judge failed, using first-candidate fallback");
                self.fallback.select(product, candidates).await
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct JudgeReply {
    /// 1-based index into the candidate list; 0 means no candidate matches.
    selected_index: usize,
    confidence: u8,
    #[serde(default)]
    justification: String,
}

fn build_judge_prompt(product: &ProductRecord, candidates: &[Listing]) -> String {
    let mut candidate_lines = String::new();
    for (i, listing) in candidates.iter().enumerate() {
        let price = listing
            .price
            .map(|p| format!("${p}"))
            .unwrap_or_else(|| "unknown".to_string());
        let rank = listing
            .sales_rank
            .map(|r| r.to_string())
            .unwrap_or_else(|| "none".to_string());
        let mut line = format!(
            "{}. \"{}\" | price: {} | sales rank: {} | offers: {} | category: {} | pack of {}",
            i + 1,
            listing.title,
            price,
            rank,
            listing.offer_count,
            listing.category,
            listing.pack_count,
        );
        if let Some(weight) = listing.weight_lbs {
            line.push_str(&format!(" | {} lbs", weight.round_dp(2)));
        }
        if let Some((l, w, h)) = listing.dimensions_in {
            line.push_str(&format!(" | {l}x{w}x{h} in"));
        }
        line.push('\n');
        candidate_lines.push_str(&line);
    }

    let cost = product
        .cost_price()
        .map(|c| format!("${c}"))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        r#"Decide which marketplace listing (if any) is the SAME product as this source item.

SOURCE ITEM:
- Name: {name}
- Search term used: {search_name}
- Brand: {brand}
- SKU: {sku}
- Cost price: {cost}

RULES:
1. The listing must be the same product, not an accessory, refill, or different model.
2. Brand must match. A different brand is never the same product.
3. Pack sizes must be compatible: a single unit is not a 5-pack.
4. A declared key specification (capacity, size, storage, screen inches) must match.
5. Prefer the listing whose title most specifically describes the source item.
6. If no listing is the same product, select 0.

CANDIDATES:
{candidate_lines}
Return ONLY a JSON object, no markdown, no explanation:
{{"selected_index": <1-based index or 0 for none>, "confidence": <0-100>, "justification": "<one sentence>"}}"#,
        name = product.name,
        search_name = product.search_name(),
        brand = product.brand.as_deref().unwrap_or("unknown"),
        sku = product.sku,
        cost = cost,
        candidate_lines = candidate_lines,
    )
}

/// Non-negotiable rejection rules, applied to any pick.
fn hard_reject(product: &ProductRecord, listing: &Listing) -> Option<String> {
    if let Some(brand) = product.brand.as_deref() {
        let brand = brand.trim();
        if !brand.is_empty() && !listing.title.to_lowercase().contains(&brand.to_lowercase()) {
            return Some(format!("brand '{brand}' absent from listing title"));
        }
    }
    if let Some(declared) = declared_pack_count(&product.name) {
        if declared != listing.pack_count {
            return Some(format!(
                "pack count mismatch: source declares {declared}, listing is a pack of {}",
                listing.pack_count
            ));
        }
    }
    None
}

/// Pack count the source name declares, if any ("5-pack", "8 count",
/// "pack of 3", "12-ct").
pub fn declared_pack_count(name: &str) -> Option<i64> {
    let lower = name.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        for suffix in ["-pack", "-count", "-ct"] {
            if let Some(qty) = token.strip_suffix(suffix) {
                if let Ok(n) = qty.parse::<i64>() {
                    return Some(n);
                }
            }
        }
        if matches!(*token, "pack" | "count" | "ct") && i > 0 {
            if let Ok(n) = tokens[i - 1].parse::<i64>() {
                return Some(n);
            }
        }
        if *token == "pack" && i + 2 < tokens.len() && tokens[i + 1] == "of" {
            if let Ok(n) = tokens[i + 2].parse::<i64>() {
                return Some(n);
            }
        }
    }
    None
}
