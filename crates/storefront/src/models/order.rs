//! Placed orders.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{Amount, CouponCode, CouponId, OrderId, OrderStatus, ProductId, Quantity, UserId};

/// An order with its lines. Names and prices are as of placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub subtotal: Amount,
    pub discount_amount: Amount,
    pub total: Amount,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

/// One product on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Amount,
    pub quantity: Quantity,
    pub line_total: Amount,
}

/// A coupon redemption to record with a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: CouponCode,
    pub amount: Amount,
}

/// An order about to be placed from a priced cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub subtotal: Amount,
    pub coupon: Option<AppliedCoupon>,
    pub total: Amount,
}

impl NewOrder {
    #[must_use]
    pub fn discount_amount(&self) -> Amount {
        self.coupon.as_ref().map_or(Amount::ZERO, |c| c.amount)
    }
}
