//! Product catalog repository.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use quardcube_core::{Price, ProductId};

use super::{CatalogStore, RepositoryError};
use crate::models::Product;

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, category, rating, image";

/// Catalog entry as written by the seeding command.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    pub stock: i32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub rating: Option<Decimal>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Repository for `products`.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product, or update the existing product with the same name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_by_name(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO products (name, description, price, stock, category, rating, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO UPDATE SET
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                category = EXCLUDED.category,
                rating = EXCLUDED.rating,
                image = EXCLUDED.image,
                updated_at = NOW()
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price)
        .bind(product.stock)
        .bind(product.category.as_deref())
        .bind(product.rating)
        .bind(product.image.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }
}

impl CatalogStore for ProductRepository<'_> {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    async fn products(&self, category: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE $1::text IS NULL OR category = $1
             ORDER BY name"
        ))
        .bind(category)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = i32::try_from(quantity)
            .map_err(|_| RepositoryError::Conflict(format!("quantity {quantity} out of range")))?;

        let remaining: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            ",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await?;

        Ok(remaining)
    }
}
