//! Priced cart views returned by the cart endpoints.

use serde::Serialize;

use bazaar_core::{Amount, ProductId, Quantity};

/// A cart line with its current catalog name and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Amount,
    pub quantity: Quantity,
    pub line_total: Amount,
}

/// A cart priced against the current catalog.
///
/// Lines for products that no longer exist or were discontinued are left
/// out of `lines` and `subtotal` and listed in `unavailable_product_ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Amount,
    pub item_count: u32,
    pub unavailable_product_ids: Vec<ProductId>,
}

impl PricedCart {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.unavailable_product_ids.is_empty()
    }
}

/// `POST /cart/merge` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub cart: PricedCart,
    /// Guest or account products dropped because they are no longer sold.
    pub dropped_product_ids: Vec<ProductId>,
}
