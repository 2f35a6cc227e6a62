//! Order repository.
//!
//! Orders are stored across three tables: the header in `storefront.order`,
//! frozen lines in `order_line` and the append-only history in
//! `order_status`. Loading always assembles all three.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use vidriera_core::{
    OrderId, OrderNumber, OrderStatus, PaymentMethod, ProductId, ShippingInfo, StatusEntry, UserId,
};

use super::{RepositoryError, classify};
use crate::models::{NewOrder, Order, OrderLine};

const ORDER_COLUMNS: &str = "id, order_number, user_id, shipping_name, shipping_surname, \
     shipping_province, shipping_city, shipping_street, shipping_number, shipping_postal_code, \
     shipping_phone, tracking_number, shipping_company, total_amount, payment_method, created_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: i64,
    user_id: UserId,
    shipping_name: String,
    shipping_surname: String,
    shipping_province: String,
    shipping_city: String,
    shipping_street: String,
    shipping_number: String,
    shipping_postal_code: String,
    shipping_phone: String,
    tracking_number: Option<String>,
    shipping_company: Option<String>,
    total_amount: Decimal,
    payment_method: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    price_at_purchase: Decimal,
}

#[derive(sqlx::FromRow)]
struct OrderStatusRow {
    order_id: OrderId,
    status: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(
        self,
        lines: Vec<OrderLine>,
        history: Vec<StatusEntry>,
    ) -> Result<Order, RepositoryError> {
        let payment_method = self
            .payment_method
            .parse::<PaymentMethod>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Order {
            id: self.id,
            number: OrderNumber::new(self.order_number),
            user_id: self.user_id,
            lines,
            shipping: ShippingInfo {
                name: self.shipping_name,
                surname: self.shipping_surname,
                province: self.shipping_province,
                city: self.shipping_city,
                street: self.shipping_street,
                number: self.shipping_number,
                postal_code: self.shipping_postal_code,
                phone: self.shipping_phone,
                tracking_number: self.tracking_number,
                shipping_company: self.shipping_company,
            },
            total: self.total_amount,
            payment_method,
            history,
            created_at: self.created_at,
        })
    }
}

/// Attach lines and history to a batch of order headers, keeping their order.
async fn assemble(conn: &mut PgConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|row| row.id.as_i32()).collect();

    let line_rows = sqlx::query_as::<_, OrderLineRow>(
        "SELECT order_id, product_id, quantity, price_at_purchase
         FROM storefront.order_line WHERE order_id = ANY($1)
         ORDER BY order_id, product_id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let status_rows = sqlx::query_as::<_, OrderStatusRow>(
        "SELECT order_id, status, created_at
         FROM storefront.order_status WHERE order_id = ANY($1)
         ORDER BY order_id, id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
    for row in line_rows {
        lines.entry(row.order_id).or_default().push(OrderLine {
            product_id: row.product_id,
            quantity: row.quantity,
            price_at_purchase: row.price_at_purchase,
        });
    }

    let mut history: HashMap<OrderId, Vec<StatusEntry>> = HashMap::new();
    for row in status_rows {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        history.entry(row.order_id).or_default().push(StatusEntry {
            status,
            timestamp: row.created_at,
        });
    }

    rows.into_iter()
        .map(|row| {
            let id = row.id;
            row.into_order(
                lines.remove(&id).unwrap_or_default(),
                history.remove(&id).unwrap_or_default(),
            )
        })
        .collect()
}

pub(super) async fn load(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(assemble(conn, vec![row]).await?.into_iter().next()),
        None => Ok(None),
    }
}

/// Insert header, lines and the initial `creado` entry.
pub(super) async fn insert(conn: &mut PgConnection, order: &NewOrder) -> Result<Order, RepositoryError> {
    let shipping = &order.shipping;
    let order_id: OrderId = sqlx::query_scalar(
        "INSERT INTO storefront.order
             (order_number, user_id, shipping_name, shipping_surname, shipping_province,
              shipping_city, shipping_street, shipping_number, shipping_postal_code,
              shipping_phone, tracking_number, shipping_company, total_amount,
              payment_method, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         RETURNING id",
    )
    .bind(order.number.as_i64())
    .bind(order.user_id)
    .bind(&shipping.name)
    .bind(&shipping.surname)
    .bind(&shipping.province)
    .bind(&shipping.city)
    .bind(&shipping.street)
    .bind(&shipping.number)
    .bind(&shipping.postal_code)
    .bind(&shipping.phone)
    .bind(shipping.tracking_number.as_deref())
    .bind(shipping.shipping_company.as_deref())
    .bind(order.total())
    .bind(order.payment_method.as_str())
    .bind(order.placed_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| classify(e, "insert order"))?;

    for line in &order.lines {
        sqlx::query(
            "INSERT INTO storefront.order_line (order_id, product_id, quantity, price_at_purchase)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price_at_purchase)
        .execute(&mut *conn)
        .await
        .map_err(|e| classify(e, "insert order line"))?;
    }

    sqlx::query(
        "INSERT INTO storefront.order_status (order_id, status, created_at) VALUES ($1, $2, $3)",
    )
    .bind(order_id)
    .bind(OrderStatus::Created.as_str())
    .bind(order.placed_at)
    .execute(&mut *conn)
    .await?;

    load(conn, order_id).await?.ok_or(RepositoryError::NotFound)
}

/// Repository for order reads and status history.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user)
            .fetch_all(&mut *conn)
            .await?;
        assemble(&mut conn, rows).await
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn all(&self) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&mut *conn)
            .await?;
        assemble(&mut conn, rows).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn append_status(
        &self,
        id: OrderId,
        entry: StatusEntry,
        tracking_number: Option<&str>,
        shipping_company: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE storefront.order
             SET tracking_number = COALESCE($2, tracking_number),
                 shipping_company = COALESCE($3, shipping_company)
             WHERE id = $1",
        )
        .bind(id)
        .bind(tracking_number)
        .bind(shipping_company)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            "INSERT INTO storefront.order_status (order_id, status, created_at) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(entry.status.as_str())
        .bind(entry.timestamp)
        .execute(&mut *tx)
        .await?;

        let order = load(&mut *tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(order)
    }
}
