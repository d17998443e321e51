//! Order placement.
//!
//! The coupon is validated against the cart subtotal first (a rejection
//! costs nothing), then redeemed inside the order transaction.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use bazaar_core::{Discount, ProductId, Rejection};

use super::cart::price;
use super::coupons::CouponService;
use crate::db::{
    CartRepository, CouponRepository, OrderRepository, PlaceOrderError, ProductRepository,
    RepositoryError,
};
use crate::models::{AppliedCoupon, CurrentUser, NewOrder, Order, OrderLine, PricedCart};

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    /// Some products in the cart are no longer sold.
    #[error("some products in the cart are no longer available")]
    UnavailableProducts(Vec<ProductId>),

    /// The coupon failed validation against the cart subtotal.
    #[error("{0}")]
    CouponRejected(Rejection),

    /// The coupon passed validation but was used up or withdrawn before the
    /// order committed.
    #[error("coupon is no longer available")]
    CouponUnavailable,

    #[error("cart changed while placing the order, please review it and try again")]
    CartChanged,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<PlaceOrderError> for CheckoutError {
    fn from(e: PlaceOrderError) -> Self {
        match e {
            PlaceOrderError::CouponUnavailable => Self::CouponUnavailable,
            PlaceOrderError::CartChanged => Self::CartChanged,
            PlaceOrderError::Repository(e) => Self::Repository(e),
        }
    }
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order for everything in the user's account cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if there is nothing to order.
    /// Returns `CheckoutError::UnavailableProducts` if any line can't be sold.
    /// Returns `CheckoutError::CouponRejected` if the coupon fails validation.
    /// Returns `CheckoutError::CouponUnavailable` if the coupon can't be redeemed.
    /// Returns `CheckoutError::CartChanged` if the cart changed concurrently.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn place_order(
        &self,
        user: &CurrentUser,
        coupon_code: Option<&str>,
    ) -> Result<Order, CheckoutError> {
        let cart = CartRepository::new(self.pool).get(user.id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let ids: Vec<ProductId> = cart.product_ids().collect();
        let products = ProductRepository::new(self.pool).get_many(&ids).await?;
        let priced = price(&cart, &products);
        if !priced.unavailable_product_ids.is_empty() {
            return Err(CheckoutError::UnavailableProducts(priced.unavailable_product_ids));
        }

        let discount = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                let coupons = CouponService::new(CouponRepository::new(self.pool));
                let discount = coupons
                    .check(code, priced.subtotal, Utc::now())
                    .await?
                    .map_err(CheckoutError::CouponRejected)?;
                Some(discount)
            }
            None => None,
        };

        let new_order = build_order(user, &priced, discount.as_ref());
        let order = OrderRepository::new(self.pool)
            .place(&new_order)
            .await
            .inspect_err(|e| {
                if matches!(e, PlaceOrderError::CouponUnavailable) {
                    warn!(coupon = ?new_order.coupon, "Coupon redemption lost race at checkout");
                }
            })?;

        info!(order_id = %order.id, total = %order.total, "Order placed");

        Ok(order)
    }
}

/// Build the order to insert from a fully available priced cart.
fn build_order(user: &CurrentUser, priced: &PricedCart, discount: Option<&Discount>) -> NewOrder {
    let lines = priced
        .lines
        .iter()
        .map(|line| OrderLine {
            product_id: line.product_id,
            product_name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.line_total,
        })
        .collect();

    let coupon = discount.map(|d| AppliedCoupon {
        coupon_id: d.coupon_id,
        code: d.code.clone(),
        amount: d.amount,
    });
    let total = discount.map_or(priced.subtotal, |d| d.final_total);

    NewOrder {
        user_id: user.id,
        lines,
        subtotal: priced.subtotal,
        coupon,
        total,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{Amount, CouponCode, CouponId, Quantity, UserId};

    use super::*;
    use crate::models::PricedLine;

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(42),
            email: "shopper@example.com".to_string(),
        }
    }

    fn priced() -> PricedCart {
        PricedCart {
            lines: vec![PricedLine {
                product_id: ProductId::new(1),
                name: "Kettle".to_string(),
                unit_price: Amount::new(25_000).unwrap(),
                quantity: Quantity::new(2).unwrap(),
                line_total: Amount::new(50_000).unwrap(),
            }],
            subtotal: Amount::new(50_000).unwrap(),
            item_count: 2,
            unavailable_product_ids: Vec::new(),
        }
    }

    #[test]
    fn test_build_order_without_coupon() {
        let order = build_order(&user(), &priced(), None);

        assert_eq!(order.user_id, UserId::new(42));
        assert_eq!(order.total, order.subtotal);
        assert_eq!(order.discount_amount(), Amount::ZERO);
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].product_name, "Kettle");
    }

    #[test]
    fn test_build_order_applies_discount() {
        let discount = Discount {
            coupon_id: CouponId::new(3),
            code: CouponCode::parse("TENOFF").unwrap(),
            amount: Amount::new(5_000).unwrap(),
            final_total: Amount::new(45_000).unwrap(),
        };

        let order = build_order(&user(), &priced(), Some(&discount));

        assert_eq!(order.subtotal, Amount::new(50_000).unwrap());
        assert_eq!(order.discount_amount(), Amount::new(5_000).unwrap());
        assert_eq!(order.total, Amount::new(45_000).unwrap());
        assert_eq!(order.coupon.unwrap().coupon_id, CouponId::new(3));
    }

    #[test]
    fn test_place_order_error_mapping() {
        assert!(matches!(
            CheckoutError::from(PlaceOrderError::CouponUnavailable),
            CheckoutError::CouponUnavailable
        ));
        assert!(matches!(
            CheckoutError::from(PlaceOrderError::CartChanged),
            CheckoutError::CartChanged
        ));
    }
}
