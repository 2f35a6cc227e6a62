//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use vidriera_core::ProductId;

use super::{RepositoryError, classify};
use crate::models::{Product, ProductDraft, ProductFilter};

const PRODUCT_COLUMNS: &str = "id, brand, model, category, size, base_price, offer_price, \
     description, color, stock, images, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    brand: String,
    model: String,
    category: String,
    size: Decimal,
    base_price: Decimal,
    offer_price: Option<Decimal>,
    description: String,
    color: String,
    stock: i32,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            brand: row.brand,
            model: row.model,
            category: row.category,
            size: row.size,
            base_price: row.base_price,
            offer_price: row.offer_price,
            description: row.description,
            color: row.color,
            stock: row.stock,
            images: row.images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escape `LIKE` wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Repository for catalog queries.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product
             WHERE ($1::text IS NULL OR category = $1)
               AND ($2::text IS NULL
                    OR brand ILIKE $2 OR model ILIKE $2
                    OR description ILIKE $2 OR category ILIKE $2)
             ORDER BY id"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(filter.category())
            .bind(filter.search_term().as_deref().map(like_pattern))
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = ANY($1) ORDER BY id"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(raw)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.product
                 (brand, model, category, size, base_price, offer_price, description, color, stock, images)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&draft.brand)
            .bind(&draft.model)
            .bind(&draft.category)
            .bind(draft.size)
            .bind(draft.base_price)
            .bind(draft.offer_price)
            .bind(&draft.description)
            .bind(&draft.color)
            .bind(draft.stock)
            .bind(&draft.images)
            .fetch_one(self.pool)
            .await
            .map_err(|e| classify(e, "create product"))?;

        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(&self, id: ProductId, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.product
             SET brand = $2, model = $3, category = $4, size = $5, base_price = $6,
                 offer_price = $7, description = $8, color = $9, stock = $10, images = $11,
                 updated_at = now()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(&draft.brand)
            .bind(&draft.model)
            .bind(&draft.category)
            .bind(draft.size)
            .bind(draft.base_price)
            .bind(draft.offer_price)
            .bind(&draft.description)
            .bind(&draft.color)
            .bind(draft.stock)
            .bind(&draft.images)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| classify(e, "update product"))?;

        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }

    /// Cart lines go with the product (`ON DELETE CASCADE`); order lines
    /// block the delete (`ON DELETE RESTRICT`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if an order references the product.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| classify(e, "product has been ordered"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
