//! Catalog/price-history API client.
//!
//! One search request per product, paced by a governor rate limiter built
//! from the configured inter-request delay. Zero results are an explicit
//! non-error outcome; transport failures surface as `CatalogError` and are
//! left to the next scheduling cycle rather than retried inline.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::catalog::parse::parse_listing;
use crate::catalog::{BudgetStatus, CatalogResponse, Listing};
use crate::config::{CatalogConfig, RateLimitConfig};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog API returned {status}: {body}")]
    Http { status: u16, body: String },
}

pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    config: CatalogConfig,
    limiter: Arc<Limiter>,
}

impl CatalogClient {
    pub fn new(
        config: CatalogConfig,
        rate_limit: &RateLimitConfig,
        api_key: String,
    ) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let limiter = create_rate_limiter(rate_limit);

        Ok(Self {
            http,
            base_url,
            api_key,
            config,
            limiter,
        })
    }

    /// Search the catalog for candidates matching a product name.
    /// `Ok(vec![])` means the catalog explicitly returned zero results.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        name: &str,
        brand: Option<&str>,
    ) -> Result<Vec<Listing>, CatalogError> {
        self.rate_limit().await;

        let term = build_query(name, brand, self.config.query_max_len);
        let url = format!(
            "{}/product?key={}&domain={}&type=search&term={}&stats={}&only-live-offers=1&offers=20",
            self.base_url,
            self.api_key,
            self.config.domain,
            urlencoding::encode(&term),
            self.config.stats_days,
        );

        let response: CatalogResponse = self.get_json(&url).await?;

        let mut listings: Vec<Listing> = response
            .products
            .iter()
            .filter_map(parse_listing)
            .collect();
        listings.truncate(self.config.max_candidates);

        debug!(term = %term, candidates = listings.len(), "Catalog search complete");
        Ok(listings)
    }

    /// Fetch one exact listing by its catalog identifier (manual override path).
    #[instrument(skip(self))]
    pub async fn fetch_by_asin(&self, asin: &str) -> Result<Option<Listing>, CatalogError> {
        self.rate_limit().await;

        let url = format!(
            "{}/product?key={}&domain={}&asin={}&stats={}&offers=20",
            self.base_url,
            self.api_key,
            self.config.domain,
            urlencoding::encode(asin),
            self.config.stats_days,
        );

        let response: CatalogResponse = self.get_json(&url).await?;
        Ok(response.products.iter().filter_map(parse_listing).next())
    }

    /// Query the remaining request budget and its replenishment ETA.
    pub async fn budget(&self) -> Result<BudgetStatus, CatalogError> {
        let url = format!("{}/token?key={}", self.base_url, self.api_key);
        let status: BudgetStatus = self.get_json(&url).await?;
        info!(
            tokens_left = status.tokens_left,
            refill_in_ms = status.refill_in_ms,
            "Catalog budget status"
        );
        Ok(status)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn rate_limit(&self) {
        self.limiter.until_ready().await;
    }
}

/// One request per inter-request delay. The delay is injected via config so
/// tests run at a near-zero pace.
fn create_rate_limiter(config: &RateLimitConfig) -> Arc<Limiter> {
    let period = Duration::from_millis(config.inter_request_delay_ms.max(1));
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).expect("nonzero")));
    Arc::new(RateLimiter::direct(quota))
}

/// Build a bounded search query: brand-prefixed unless the brand already
/// appears in the name, commas stripped, whitespace collapsed.
pub fn build_query(name: &str, brand: Option<&str>, max_len: usize) -> String {
    let mut query = match brand {
        Some(brand)
            if !brand.trim().is_empty()
                && !name.to_lowercase().contains(&brand.trim().to_lowercase()) =>
        {
            format!("{} {}", brand.trim(), name)
        }
        _ => name.to_string(),
    };

    query = query.replace(',', "");
    query = query.split_whitespace().collect::<Vec<_>>().join(" ");
    query.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> CatalogClient {
        let config = CatalogConfig {
            base_url: base_url.to_string(),
            domain: 1,
            max_candidates: 10,
            stats_days: 90,
            query_max_len: 100,
        };
        let rate_limit = RateLimitConfig {
            inter_request_delay_ms: 1,
        };
        CatalogClient::new(config, &rate_limit, "test-key".to_string()).expect("client")
    }

    #[test]
    fn test_build_query_prefixes_missing_brand() {
        let q = build_query("Pro Health Toothpaste", Some("Crest"), 100);
        assert_eq!(q, "Crest Pro Health Toothpaste");
    }

    #[test]
    fn test_build_query_skips_present_brand_case_insensitive() {
        let q = build_query("CREST Pro Health Toothpaste", Some("crest"), 100);
        assert_eq!(q, "CREST Pro Health Toothpaste");
    }

    #[test]
    fn test_build_query_strips_commas_and_collapses_spaces() {
        let q = build_query("Olive Oil,  2 L,   Organic", None, 100);
        assert_eq!(q, "Olive Oil 2 L Organic");
    }

    #[test]
    fn test_build_query_truncates() {
        let long = "word ".repeat(50);
        let q = build_query(&long, None, 100);
        assert_eq!(q.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_search_parses_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product"))
            .and(query_param("type", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tokensLeft": 58,
                "products": [
                    {
                        "asin": "B00AAA",
                        "title": "Crest Pro Health Toothpaste",
                        "csv": [null, [2499]],
                        "offerCountFBA": 4
                    },
                    {
                        "asin": "B00BBB",
                        "title": "Crest Whitening Toothpaste",
                        "csv": [null, [1899]]
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let listings = client.search("Crest Pro Health", None).await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].asin, "B00AAA");
        assert_eq!(listings[0].price, Some(dec!(24.99)));
        assert_eq!(listings[0].offer_count, 4);
    }

    #[tokio::test]
    async fn test_search_zero_results_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"products": []})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let listings = client.search("No Such Product", None).await.unwrap();
        assert!(listings.is_empty());
    }

    #[tokio::test]
    async fn test_search_http_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.search("Anything", None).await.unwrap_err();
        match err {
            CatalogError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_by_asin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product"))
            .and(query_param("asin", "B00ZZZ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [{"asin": "B00ZZZ", "title": "Exact Item", "csv": [null, [4500]]}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let listing = client.fetch_by_asin("B00ZZZ").await.unwrap().expect("listing");
        assert_eq!(listing.asin, "B00ZZZ");
        assert_eq!(listing.price, Some(dec!(45.00)));
    }

    #[tokio::test]
    async fn test_budget_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tokensLeft": 12,
                "refillIn": 42000,
                "refillRate": 5
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let budget = client.budget().await.unwrap();
        assert_eq!(budget.tokens_left, 12);
        assert_eq!(budget.refill_in_ms, 42000);
    }
}
