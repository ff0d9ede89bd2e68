use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

pub struct Store {
    pool: SqlitePool,
}

/// Lifecycle status of a tracked product. `New` products have never been
/// matched; the remaining variants are assigned by the matching cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProductStatus {
    New,
    Profitable,
    Potential,
    Risky,
    Skip,
    NotFound,
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Profitable => write!(f, "Profitable"),
            Self::Potential => write!(f, "Potential"),
            Self::Risky => write!(f, "Risky"),
            Self::Skip => write!(f, "Skip"),
            Self::NotFound => write!(f, "Not Found"),
        }
    }
}

impl ProductStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "Profitable" => Self::Profitable,
            "Potential" => Self::Potential,
            "Risky" => Self::Risky,
            "Skip" => Self::Skip,
            "Not Found" => Self::NotFound,
            _ => Self::New,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductRecord {
    pub id: Option<i64>,
    pub sku: String,
    pub name: String,
    pub cleaned_name: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Option<String>,
    pub original_price: Option<String>,
    pub in_stock: bool,
    pub status: String,
    pub override_asin: Option<String>,
    pub asin: Option<String>,
    pub sale_price: Option<String>,
    pub fulfillment_fees: Option<String>,
    pub sales_rank: Option<i64>,
    pub category: Option<String>,
    pub profit: Option<String>,
    pub roi: Option<String>,
    pub confidence: Option<i64>,
    pub justification: Option<String>,
    pub last_updated: Option<String>,
}

impl ProductRecord {
    pub fn status(&self) -> ProductStatus {
        ProductStatus::parse(&self.status)
    }

    pub fn cost_price(&self) -> Option<Decimal> {
        self.cost_price.as_deref().and_then(|s| Decimal::from_str(s).ok())
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// The name used for catalog search: the cleaned name when present.
    pub fn search_name(&self) -> &str {
        self.cleaned_name.as_deref().unwrap_or(&self.name)
    }
}

/// Fields written back to a product after a matching cycle resolves it.
#[derive(Debug, Clone, Default)]
pub struct MatchFields {
    pub asin: Option<String>,
    pub sale_price: Option<Decimal>,
    pub fulfillment_fees: Option<Decimal>,
    pub sales_rank: Option<i64>,
    pub category: Option<String>,
    pub profit: Option<Decimal>,
    pub roi: Option<Decimal>,
    pub confidence: i64,
    pub justification: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PriceHistoryRecord {
    pub id: Option<i64>,
    pub product_id: i64,
    pub sku: String,
    pub old_price: Option<String>,
    pub new_price: String,
    pub created_at: Option<String>,
}

impl Store {
    /// Create a Store from an existing pool (for sharing between components).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid database path")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // Execute each statement separately (sqlx doesn't support multiple statements in one call)
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    // --- Product operations ---

    pub async fn insert_product(&self, product: &ProductRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO products (sku, name, cleaned_name, brand, cost_price, original_price, in_stock, status, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.cleaned_name)
        .bind(&product.brand)
        .bind(&product.cost_price)
        .bind(&product.original_price)
        .bind(product.in_stock)
        .bind(&product.status)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert product")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_sku(&self, sku: &str) -> Result<Option<ProductRecord>> {
        let product =
            sqlx::query_as::<_, ProductRecord>("SELECT * FROM products WHERE sku = ?")
                .bind(sku)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to find product by SKU")?;
        Ok(product)
    }

    pub async fn get_products_by_status(&self, status: ProductStatus) -> Result<Vec<ProductRecord>> {
        let products =
            sqlx::query_as::<_, ProductRecord>("SELECT * FROM products WHERE status = ? ORDER BY id")
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch products by status")?;
        Ok(products)
    }

    pub async fn get_all_products(&self) -> Result<Vec<ProductRecord>> {
        let products = sqlx::query_as::<_, ProductRecord>("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch all products")?;
        Ok(products)
    }

    /// Products whose raw name has never been cleaned.
    pub async fn get_products_missing_cleaned_name(&self) -> Result<Vec<ProductRecord>> {
        let products = sqlx::query_as::<_, ProductRecord>(
            "SELECT * FROM products WHERE cleaned_name IS NULL OR cleaned_name = '' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch products missing cleaned names")?;
        Ok(products)
    }

    pub async fn update_cleaned_name(&self, id: i64, cleaned_name: &str) -> Result<()> {
        sqlx::query("UPDATE products SET cleaned_name = ? WHERE id = ?")
            .bind(cleaned_name)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update cleaned name")?;
        Ok(())
    }

    /// Write the outcome of a matching cycle back to the product row.
    pub async fn update_match(&self, id: i64, fields: &MatchFields) -> Result<()> {
        sqlx::query(
            "UPDATE products SET asin = ?, sale_price = ?, fulfillment_fees = ?, sales_rank = ?,
             category = ?, profit = ?, roi = ?, confidence = ?, justification = ?, status = ?,
             last_updated = ? WHERE id = ?",
        )
        .bind(&fields.asin)
        .bind(fields.sale_price.map(|d| d.to_string()))
        .bind(fields.fulfillment_fees.map(|d| d.to_string()))
        .bind(fields.sales_rank)
        .bind(&fields.category)
        .bind(fields.profit.map(|d| d.to_string()))
        .bind(fields.roi.map(|d| d.to_string()))
        .bind(fields.confidence)
        .bind(&fields.justification)
        .bind(&fields.status)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update product match fields")?;
        Ok(())
    }

    pub async fn set_status(&self, id: i64, status: ProductStatus) -> Result<()> {
        sqlx::query("UPDATE products SET status = ?, last_updated = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update product status")?;
        Ok(())
    }

    /// Flag a product for manual ASIN override.
    pub async fn set_override_asin(&self, id: i64, asin: &str) -> Result<()> {
        sqlx::query("UPDATE products SET override_asin = ? WHERE id = ?")
            .bind(asin)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to set override ASIN")?;
        Ok(())
    }

    /// Clear the manual override marker. Called whether or not the override
    /// fetch succeeded, so a bad ASIN cannot be reprocessed forever.
    pub async fn clear_override(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE products SET override_asin = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to clear override ASIN")?;
        Ok(())
    }

    pub async fn update_cost_price(&self, id: i64, cost_price: Decimal) -> Result<()> {
        sqlx::query("UPDATE products SET cost_price = ?, last_updated = ? WHERE id = ?")
            .bind(cost_price.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update cost price")?;
        Ok(())
    }

    // --- Price history operations (append-only) ---

    pub async fn insert_price_history(&self, entry: &PriceHistoryRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO price_history (product_id, sku, old_price, new_price, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.product_id)
        .bind(&entry.sku)
        .bind(&entry.old_price)
        .bind(&entry.new_price)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert price history entry")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_price_history(&self, product_id: i64) -> Result<Vec<PriceHistoryRecord>> {
        let entries = sqlx::query_as::<_, PriceHistoryRecord>(
            "SELECT * FROM price_history WHERE product_id = ? ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch price history")?;
        Ok(entries)
    }
}

/// A fresh product row ready for insertion.
pub fn new_product(
    sku: String,
    name: String,
    brand: Option<String>,
    cost_price: Option<Decimal>,
    original_price: Option<Decimal>,
    in_stock: bool,
) -> ProductRecord {
    ProductRecord {
        id: None,
        sku,
        name,
        cleaned_name: None,
        brand,
        cost_price: cost_price.map(|d| d.to_string()),
        original_price: original_price.map(|d| d.to_string()),
        in_stock,
        status: ProductStatus::New.to_string(),
        override_asin: None,
        asin: None,
        sale_price: None,
        fulfillment_fees: None,
        sales_rank: None,
        category: None,
        profit: None,
        roi: None,
        confidence: None,
        justification: None,
        last_updated: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn test_store() -> Store {
        Store::new(":memory:").await.expect("should create store")
    }

    #[tokio::test]
    async fn test_store_create_and_migrate() {
        let store = test_store().await;
        let product = new_product(
            "123456".to_string(),
            "Kirkland Signature Organic Olive Oil, 2 L".to_string(),
            Some("Kirkland Signature".to_string()),
            Some(dec!(19.99)),
            Some(dec!(24.99)),
            true,
        );
        let id = store.insert_product(&product).await.expect("should insert");
        assert!(id > 0);
    }

    #[tokio::test]
    async fn test_find_by_sku_and_status() {
        let store = test_store().await;
        let product = new_product(
            "777".to_string(),
            "Dyson V15 Detect Vacuum".to_string(),
            Some("Dyson".to_string()),
            Some(dec!(499.99)),
            None,
            true,
        );
        store.insert_product(&product).await.unwrap();

        let found = store.find_by_sku("777").await.unwrap().expect("should exist");
        assert_eq!(found.name, "Dyson V15 Detect Vacuum");
        assert_eq!(found.status(), ProductStatus::New);
        assert_eq!(found.cost_price(), Some(dec!(499.99)));

        let new_products = store.get_products_by_status(ProductStatus::New).await.unwrap();
        assert_eq!(new_products.len(), 1);

        assert!(store.find_by_sku("000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_match_fields() {
        let store = test_store().await;
        let product = new_product(
            "42".to_string(),
            "Crest Pro Health Toothpaste, 5-pack".to_string(),
            Some("Crest".to_string()),
            Some(dec!(12.99)),
            None,
            true,
        );
        let id = store.insert_product(&product).await.unwrap();

        let fields = MatchFields {
            asin: Some("B00TESTASIN".to_string()),
            sale_price: Some(dec!(24.99)),
            fulfillment_fees: Some(dec!(3.50)),
            sales_rank: Some(4200),
            category: Some("Health & Household".to_string()),
            profit: Some(dec!(4.75)),
            roi: Some(dec!(36.57)),
            confidence: 85,
            justification: Some("Hot seller (rank 4,200)".to_string()),
            status: ProductStatus::Profitable.to_string(),
        };
        store.update_match(id, &fields).await.unwrap();

        let updated = store.find_by_sku("42").await.unwrap().unwrap();
        assert_eq!(updated.status(), ProductStatus::Profitable);
        assert_eq!(updated.asin.as_deref(), Some("B00TESTASIN"));
        assert_eq!(updated.confidence, Some(85));
        assert!(updated.last_updated().is_some());
    }

    #[tokio::test]
    async fn test_override_set_and_clear() {
        let store = test_store().await;
        let product = new_product("9".to_string(), "Widget".to_string(), None, None, None, true);
        let id = store.insert_product(&product).await.unwrap();

        store.set_override_asin(id, "B00MANUAL").await.unwrap();
        let flagged = store.find_by_sku("9").await.unwrap().unwrap();
        assert_eq!(flagged.override_asin.as_deref(), Some("B00MANUAL"));

        store.clear_override(id).await.unwrap();
        let cleared = store.find_by_sku("9").await.unwrap().unwrap();
        assert!(cleared.override_asin.is_none());
    }

    #[tokio::test]
    async fn test_price_history_append_only() {
        let store = test_store().await;
        let product = new_product("55".to_string(), "Blender".to_string(), None, Some(dec!(89.99)), None, true);
        let id = store.insert_product(&product).await.unwrap();

        let entry = PriceHistoryRecord {
            id: None,
            product_id: id,
            sku: "55".to_string(),
            old_price: Some("89.99".to_string()),
            new_price: "79.99".to_string(),
            created_at: None,
        };
        store.insert_price_history(&entry).await.unwrap();
        store
            .insert_price_history(&PriceHistoryRecord {
                old_price: Some("79.99".to_string()),
                new_price: "74.99".to_string(),
                ..entry.clone()
            })
            .await
            .unwrap();

        let history = store.get_price_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].new_price, "79.99");
        assert_eq!(history[1].new_price, "74.99");
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProductStatus::New,
            ProductStatus::Profitable,
            ProductStatus::Potential,
            ProductStatus::Risky,
            ProductStatus::Skip,
            ProductStatus::NotFound,
        ] {
            assert_eq!(ProductStatus::parse(&status.to_string()), status);
        }
    }
}
