//! Cart service.
//!
//! Validates products against the catalog before they go into a cart,
//! prices carts for display, and merges a guest cart into an account cart
//! at login.

mod error;
mod store;

pub use error::CartError;
pub use store::{AccountCartStore, ActiveCart, CartStore, SessionCartStore};

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::{info, instrument};

use bazaar_core::{Amount, Cart, CartLine, ProductId, Quantity, UserId};

use crate::db::{CartRepository, ProductRepository};
use crate::models::{MergeResponse, PricedCart, PricedLine, Product};

/// Cart service.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// The cart in `store`, priced against the current catalog.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Session` or `CartError::Repository` if loading fails.
    pub async fn view(&self, store: &impl CartStore) -> Result<PricedCart, CartError> {
        let cart = store.get().await?;
        self.price(&cart).await
    }

    /// Price a cart against the current catalog.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the product lookup fails.
    pub async fn price(&self, cart: &Cart) -> Result<PricedCart, CartError> {
        let ids: Vec<ProductId> = cart.product_ids().collect();
        let products = self.products.get_many(&ids).await?;
        Ok(price(cart, &products))
    }

    /// Add units of an available product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` or `CartError::ProductUnavailable`
    /// if the product can't be sold.
    pub async fn add(
        &self,
        store: &impl CartStore,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<PricedCart, CartError> {
        self.require_available(product_id).await?;
        store.add(product_id, quantity).await?;
        self.view(store).await
    }

    /// Set a line's quantity. Zero removes the line, even for a product that
    /// has since been discontinued.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` above the per-line cap.
    /// Returns `CartError::ProductNotFound` or `CartError::ProductUnavailable`
    /// when setting a positive quantity on a product that can't be sold.
    pub async fn update(
        &self,
        store: &impl CartStore,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<PricedCart, CartError> {
        if quantity > 0 {
            Quantity::new(quantity)?;
            self.require_available(product_id).await?;
        }
        store.update(product_id, quantity).await?;
        self.view(store).await
    }

    /// Remove a line. Removing a product that isn't in the cart is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Session` or `CartError::Repository` if storage fails.
    pub async fn remove(
        &self,
        store: &impl CartStore,
        product_id: ProductId,
    ) -> Result<PricedCart, CartError> {
        store.remove(product_id).await?;
        self.view(store).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Session` or `CartError::Repository` if storage fails.
    pub async fn clear(&self, store: &impl CartStore) -> Result<PricedCart, CartError> {
        store.clear().await?;
        Ok(PricedCart::default())
    }

    /// Merge guest lines into a user's account cart.
    ///
    /// The guest cart held in the session is folded together with `local`
    /// (a client may send only some of its lines, or none). The session's
    /// guest cart is cleared once the merge has committed, so the same lines
    /// can't be summed in twice.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the merge transaction fails; the
    /// account cart and the guest cart are then both left as they were.
    #[instrument(skip(self, guest, local), fields(user_id = %user_id, local_lines = local.len()))]
    pub async fn merge(
        &self,
        user_id: UserId,
        guest: &SessionCartStore,
        local: Vec<CartLine>,
    ) -> Result<MergeResponse, CartError> {
        let local = Cart::from_lines(guest.get().await?.into_lines().into_iter().chain(local));

        let outcome = self.carts.merge(user_id, local.lines()).await?;
        guest.take().await?;

        if !outcome.dropped.is_empty() {
            info!(dropped = ?outcome.dropped, "Dropped unavailable products during cart merge");
        }

        let cart = self.price(&outcome.cart).await?;
        Ok(MergeResponse {
            cart,
            dropped_product_ids: outcome.dropped,
        })
    }

    async fn require_available(&self, product_id: ProductId) -> Result<Product, CartError> {
        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;
        if !product.is_available() {
            return Err(CartError::ProductUnavailable(product_id));
        }
        Ok(product)
    }
}

/// Price `cart` against `products`.
///
/// Lines whose product is missing from `products` or discontinued are
/// reported in `unavailable_product_ids` and excluded from the totals.
#[must_use]
pub fn price(cart: &Cart, products: &[Product]) -> PricedCart {
    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut priced = PricedCart::default();
    for line in cart.lines() {
        let Some(product) = by_id.get(&line.product_id).filter(|p| p.is_available()) else {
            priced.unavailable_product_ids.push(line.product_id);
            continue;
        };

        let line_total = product.price.times(line.quantity).unwrap_or(Amount::MAX);
        priced.subtotal = priced.subtotal.checked_add(line_total).unwrap_or(Amount::MAX);
        priced.item_count = priced.item_count.saturating_add(line.quantity.get());
        priced.lines.push(PricedLine {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: line.quantity,
            line_total,
        });
    }
    priced
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64, is_active: bool) -> Product {
        Product {
            id: ProductId::new(id),
            sku: format!("SKU-{id}"),
            name: format!("Product {id}"),
            price: Amount::new(price).unwrap(),
            is_active,
        }
    }

    fn line(id: i32, quantity: u32) -> CartLine {
        CartLine::new(ProductId::new(id), Quantity::new(quantity).unwrap())
    }

    #[test]
    fn test_price_sums_line_totals() {
        let cart = Cart::from_lines([line(1, 2), line(2, 3)]);
        let products = [product(1, 1_500, true), product(2, 200, true)];

        let priced = price(&cart, &products);

        assert_eq!(priced.lines.len(), 2);
        assert_eq!(priced.lines[0].line_total, Amount::new(3_000).unwrap());
        assert_eq!(priced.subtotal, Amount::new(3_600).unwrap());
        assert_eq!(priced.item_count, 5);
        assert!(priced.unavailable_product_ids.is_empty());
    }

    #[test]
    fn test_price_excludes_unavailable() {
        let cart = Cart::from_lines([line(1, 1), line(2, 1), line(3, 1)]);
        // 2 is discontinued, 3 no longer exists
        let products = [product(1, 100, true), product(2, 999, false)];

        let priced = price(&cart, &products);

        assert_eq!(priced.subtotal, Amount::new(100).unwrap());
        assert_eq!(priced.item_count, 1);
        assert_eq!(
            priced.unavailable_product_ids,
            vec![ProductId::new(2), ProductId::new(3)]
        );
    }

    #[test]
    fn test_price_keeps_cart_order() {
        let cart = Cart::from_lines([line(9, 1), line(4, 1)]);
        let products = [product(4, 1, true), product(9, 1, true)];

        let priced = price(&cart, &products);

        let ids: Vec<i32> = priced.lines.iter().map(|l| l.product_id.as_i32()).collect();
        assert_eq!(ids, vec![9, 4]);
    }

    #[test]
    fn test_price_empty_cart() {
        let priced = price(&Cart::new(), &[]);
        assert!(priced.is_empty());
        assert_eq!(priced.subtotal, Amount::ZERO);
    }

    #[test]
    fn test_priced_cart_wire_format() {
        let priced = price(&Cart::from_lines([line(1, 2)]), &[product(1, 50, true)]);
        let json = serde_json::to_value(&priced).unwrap();

        assert_eq!(json["subtotal"], 100);
        assert_eq!(json["itemCount"], 2);
        assert_eq!(json["lines"][0]["productId"], "1");
        assert_eq!(json["lines"][0]["unitPrice"], 50);
        assert_eq!(json["lines"][0]["lineTotal"], 100);
        assert!(json["unavailableProductIds"].as_array().unwrap().is_empty());
    }
}
