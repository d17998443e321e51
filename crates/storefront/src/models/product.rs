//! Catalog product domain type.

use bazaar_core::{Amount, ProductId};

/// A catalog product as far as carts and orders are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Stock keeping unit, unique across the catalog.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Amount,
    /// Discontinued products stay in the table for order history.
    pub is_active: bool,
}

impl Product {
    /// Whether the product can be added to a cart or ordered.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_active
    }
}

/// A product to create or update from a seed file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProductSeed {
    pub sku: String,
    pub name: String,
    pub price: Amount,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}
