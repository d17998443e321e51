//! Order repository.
//!
//! Placing an order is the commit phase of coupon redemption: the coupon's
//! usage counter, the order rows and the cart deletion succeed or fail
//! together in one transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use bazaar_core::{Amount, OrderId, OrderStatus, ProductId, Quantity, UserId};

use super::RepositoryError;
use super::carts::lock_cart;
use super::coupons::redeem;
use crate::models::order::{NewOrder, Order, OrderLine};

/// Errors from [`OrderRepository::place`].
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// The coupon was used up, deactivated or expired since validation.
    #[error("coupon is no longer available")]
    CouponUnavailable,

    /// The account cart changed between pricing and placement.
    #[error("cart changed while placing the order")]
    CartChanged,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    status: OrderStatus,
    subtotal: i64,
    discount_amount: i64,
    total: i64,
    coupon_code: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    unit_price: i64,
    quantity: i32,
    line_total: i64,
}

fn amount(value: i64, what: &str) -> Result<Amount, RepositoryError> {
    Amount::new(value).map_err(|e| RepositoryError::DataCorruption(format!("invalid {what}: {e}")))
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: amount(row.unit_price, "unit price")?,
            quantity: Quantity::try_from(row.quantity).map_err(|e| {
                RepositoryError::DataCorruption(format!(
                    "invalid quantity on order {}: {e}",
                    row.order_id
                ))
            })?,
            line_total: amount(row.line_total, "line total")?,
        })
    }
}

fn build_order(row: OrderRow, lines: Vec<OrderLine>) -> Result<Order, RepositoryError> {
    Ok(Order {
        id: row.id,
        status: row.status,
        subtotal: amount(row.subtotal, "subtotal")?,
        discount_amount: amount(row.discount_amount, "discount amount")?,
        total: amount(row.total, "total")?,
        coupon_code: row.coupon_code,
        created_at: row.created_at,
        lines,
    })
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order and empty the user's cart.
    ///
    /// In one transaction:
    ///
    /// 1. Delete the user's cart lines, checking they are exactly the lines
    ///    being ordered.
    /// 2. Redeem the coupon, if any, with the conditional increment.
    /// 3. Insert the order and its lines.
    ///
    /// Any failure rolls everything back, including the coupon use.
    ///
    /// # Errors
    ///
    /// Returns `PlaceOrderError::CartChanged` if the cart no longer matches.
    /// Returns `PlaceOrderError::CouponUnavailable` if the coupon can't be redeemed.
    /// Returns `PlaceOrderError::Repository` if a query fails.
    pub async fn place(&self, order: &NewOrder) -> Result<Order, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        lock_cart(&mut tx, order.user_id).await?;
        let removed: Vec<(ProductId, i32)> = sqlx::query_as(
            r"
            DELETE FROM storefront.cart_line
            WHERE user_id = $1
            RETURNING product_id, quantity
            ",
        )
        .bind(order.user_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut expected: HashMap<ProductId, i32> = order
            .lines
            .iter()
            .map(|line| (line.product_id, i32::from(line.quantity)))
            .collect();
        let unchanged = removed.len() == expected.len()
            && removed
                .iter()
                .all(|(product_id, quantity)| expected.remove(product_id) == Some(*quantity));
        if !unchanged {
            return Err(PlaceOrderError::CartChanged);
        }

        if let Some(coupon) = &order.coupon
            && !redeem(&mut *tx, coupon.coupon_id).await?
        {
            return Err(PlaceOrderError::CouponUnavailable);
        }

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO storefront.customer_order (
                user_id, subtotal, discount_amount, total, coupon_id, coupon_code
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, status, subtotal, discount_amount, total, coupon_code, created_at
            ",
        )
        .bind(order.user_id)
        .bind(order.subtotal.units())
        .bind(order.discount_amount().units())
        .bind(order.total.units())
        .bind(order.coupon.as_ref().map(|c| c.coupon_id))
        .bind(order.coupon.as_ref().map(|c| c.code.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        let product_ids: Vec<ProductId> = order.lines.iter().map(|l| l.product_id).collect();
        let names: Vec<&str> = order.lines.iter().map(|l| l.product_name.as_str()).collect();
        let unit_prices: Vec<i64> = order.lines.iter().map(|l| l.unit_price.units()).collect();
        let quantities: Vec<i32> = order.lines.iter().map(|l| i32::from(l.quantity)).collect();
        let line_totals: Vec<i64> = order.lines.iter().map(|l| l.line_total.units()).collect();

        sqlx::query(
            r"
            INSERT INTO storefront.order_line (
                order_id, line_no, product_id, product_name, unit_price, quantity, line_total
            )
            SELECT $1, t.ord::INTEGER, t.product_id, t.product_name, t.unit_price, t.quantity, t.line_total
            FROM UNNEST($2::INTEGER[], $3::TEXT[], $4::BIGINT[], $5::INTEGER[], $6::BIGINT[])
                WITH ORDINALITY AS t(product_id, product_name, unit_price, quantity, line_total, ord)
            ",
        )
        .bind(row.id)
        .bind(&product_ids)
        .bind(&names)
        .bind(&unit_prices)
        .bind(&quantities)
        .bind(&line_totals)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        build_order(row, order.lines.clone()).map_err(PlaceOrderError::from)
    }

    /// Get one of a user's orders. Orders owned by someone else are not found.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, user_id: UserId, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, status, subtotal, discount_amount, total, coupon_code, created_at
            FROM storefront.customer_order
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lines = self.lines_for(&[row.id]).await?;
        let lines = lines.remove(&row.id).unwrap_or_default();
        build_order(row, lines).map(Some)
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, status, subtotal, discount_amount, total, coupon_code, created_at
            FROM storefront.customer_order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let mut lines = self.lines_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let order_lines = lines.remove(&row.id).unwrap_or_default();
                build_order(row, order_lines)
            })
            .collect()
    }

    async fn lines_for(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderLine>>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT order_id, product_id, product_name, unit_price, quantity, line_total
            FROM storefront.order_line
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            ",
        )
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id;
            by_order.entry(order_id).or_default().push(OrderLine::try_from(row)?);
        }
        Ok(by_order)
    }
}
