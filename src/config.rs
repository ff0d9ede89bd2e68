use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub llm: LlmConfig,
    pub cleaning: CleaningConfig,
    pub matching: MatchingConfig,
    pub profit: ProfitConfig,
    pub validation: ValidationConfig,
    pub scheduler: SchedulerConfig,
    pub rate_limit: RateLimitConfig,
    pub ingest: IngestConfig,
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Marketplace domain code (1 = US).
    pub domain: u32,
    pub max_candidates: usize,
    pub stats_days: u32,
    pub query_max_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleaningConfig {
    pub batch_size: usize,
    pub max_name_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Judged selections below this confidence become "no match".
    pub accept_threshold: u8,
    /// Confidence assigned by the deterministic first-candidate strategy.
    pub fallback_confidence: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfitConfig {
    /// Marketplace referral cut of the sale price.
    pub referral_rate: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    pub rank_excellent: i64,
    pub rank_good: i64,
    pub rank_poor: i64,
    pub profit_excellent: Decimal,
    pub profit_good: Decimal,
    pub min_profit: Decimal,
    pub many_offers: i64,
    pub min_offers: i64,
    /// Price stability is only evaluated with at least this many samples.
    pub stability_min_history: usize,
    pub stable_band: Decimal,
    pub loose_band: Decimal,
    /// Status step thresholds over the final confidence score.
    pub status_profitable: u8,
    pub status_potential: u8,
    pub status_risky: u8,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            rank_excellent: 10_000,
            rank_good: 50_000,
            rank_poor: 100_000,
            profit_excellent: dec!(50),
            profit_good: dec!(25),
            min_profit: dec!(10),
            many_offers: 5,
            min_offers: 2,
            stability_min_history: 10,
            stable_band: dec!(0.10),
            loose_band: dec!(0.25),
            status_profitable: 80,
            status_potential: 60,
            status_risky: 40,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub stale_days: i64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub inter_request_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub feed_url: String,
    pub page_size: u32,
    pub max_products: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub catalog_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub feed_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            catalog_api_key: std::env::var("KEEPA_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            feed_api_key: std::env::var("COSTCO_API_KEY").ok(),
        }
    }
}

impl AppConfig {
    /// Load configuration from config/default.toml, overlaying environment variables for secrets.
    pub fn load() -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let config_path = Path::new("config/default.toml");
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig =
            toml::from_str(&contents).context("Failed to parse config/default.toml")?;

        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }
}
