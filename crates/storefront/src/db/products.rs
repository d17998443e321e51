//! Product repository for catalog lookups.

use sqlx::PgPool;

use bazaar_core::{Amount, ProductId};

use super::RepositoryError;
use crate::models::product::{Product, ProductSeed};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    sku: String,
    name: String,
    price: i64,
    is_active: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Amount::new(row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            sku: row.sku,
            name: row.name,
            price,
            is_active: row.is_active,
        })
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID, whether or not it is active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, sku, name, price, is_active
            FROM storefront.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get every product among `ids` that exists. Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, sku, name, price, is_active
            FROM storefront.product
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Insert a product, or update it in place if the SKU already exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, seed: &ProductSeed) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO storefront.product (sku, name, price, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (sku) DO UPDATE
            SET name = EXCLUDED.name,
                price = EXCLUDED.price,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING id, sku, name, price, is_active
            ",
        )
        .bind(&seed.sku)
        .bind(&seed.name)
        .bind(seed.price.units())
        .bind(seed.is_active)
        .fetch_one(self.pool)
        .await?;

        Product::try_from(row)
    }
}
