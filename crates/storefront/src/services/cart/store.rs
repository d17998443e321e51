//! Cart storage backends.
//!
//! Guests keep their cart in the session; logged-in shoppers keep it in
//! `PostgreSQL`. Both sit behind [`CartStore`] so the cart endpoints don't
//! care which one they are talking to.

use std::future::Future;

use sqlx::PgPool;
use tower_sessions::Session;

use bazaar_core::{Cart, ProductId, Quantity, UserId};

use super::CartError;
use crate::db::CartRepository;
use crate::models::CurrentUser;
use crate::models::session::keys;

/// Where a shopper's cart lives.
pub trait CartStore: Send + Sync {
    /// Current cart; empty if none has been stored yet.
    fn get(&self) -> impl Future<Output = Result<Cart, CartError>> + Send;

    /// Add units of a product, summing into an existing line. Returns the
    /// line's new quantity.
    fn add(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Quantity, CartError>> + Send;

    /// Set a line's quantity. Zero removes the line.
    fn update(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), CartError>> + Send;

    /// Remove a line. Returns `false` if the product wasn't in the cart.
    fn remove(&self, product_id: ProductId) -> impl Future<Output = Result<bool, CartError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), CartError>> + Send;
}

// =============================================================================
// Session (guest)
// =============================================================================

/// Guest cart stored under [`keys::GUEST_CART`] in the session.
#[derive(Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Take the guest cart out of the session, leaving it empty.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Session` if the session store fails.
    pub async fn take(&self) -> Result<Cart, CartError> {
        Ok(self
            .session
            .remove::<Cart>(keys::GUEST_CART)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, cart: &Cart) -> Result<(), CartError> {
        if cart.is_empty() {
            self.session.remove_value(keys::GUEST_CART).await?;
        } else {
            self.session.insert(keys::GUEST_CART, cart).await?;
        }
        Ok(())
    }
}

impl CartStore for SessionCartStore {
    async fn get(&self) -> Result<Cart, CartError> {
        Ok(self
            .session
            .get::<Cart>(keys::GUEST_CART)
            .await?
            .unwrap_or_default())
    }

    async fn add(&self, product_id: ProductId, quantity: Quantity) -> Result<Quantity, CartError> {
        let mut cart = self.get().await?;
        let new_quantity = cart.add(product_id, quantity);
        self.save(&cart).await?;
        Ok(new_quantity)
    }

    async fn update(&self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        let mut cart = self.get().await?;
        cart.set_quantity(product_id, quantity)?;
        self.save(&cart).await
    }

    async fn remove(&self, product_id: ProductId) -> Result<bool, CartError> {
        let mut cart = self.get().await?;
        let removed = cart.remove(product_id);
        if removed {
            self.save(&cart).await?;
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.save(&Cart::new()).await
    }
}

// =============================================================================
// Account
// =============================================================================

/// A logged-in shopper's cart in `storefront.cart_line`.
pub struct AccountCartStore<'a> {
    carts: CartRepository<'a>,
    user_id: UserId,
}

impl<'a> AccountCartStore<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, user_id: UserId) -> Self {
        Self {
            carts: CartRepository::new(pool),
            user_id,
        }
    }
}

impl CartStore for AccountCartStore<'_> {
    async fn get(&self) -> Result<Cart, CartError> {
        Ok(self.carts.get(self.user_id).await?)
    }

    async fn add(&self, product_id: ProductId, quantity: Quantity) -> Result<Quantity, CartError> {
        Ok(self.carts.add(self.user_id, product_id, quantity).await?)
    }

    async fn update(&self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            self.carts.remove(self.user_id, product_id).await?;
            return Ok(());
        }
        let quantity = Quantity::new(quantity)?;
        Ok(self
            .carts
            .set_quantity(self.user_id, product_id, quantity)
            .await?)
    }

    async fn remove(&self, product_id: ProductId) -> Result<bool, CartError> {
        Ok(self.carts.remove(self.user_id, product_id).await?)
    }

    async fn clear(&self) -> Result<(), CartError> {
        Ok(self.carts.clear(self.user_id).await?)
    }
}

// =============================================================================
// Selection
// =============================================================================

/// The store for the current request: account cart when logged in,
/// session cart otherwise.
pub enum ActiveCart<'a> {
    Guest(SessionCartStore),
    Account(AccountCartStore<'a>),
}

impl<'a> ActiveCart<'a> {
    #[must_use]
    pub fn select(pool: &'a PgPool, session: Session, user: Option<&CurrentUser>) -> Self {
        match user {
            Some(user) => Self::Account(AccountCartStore::new(pool, user.id)),
            None => Self::Guest(SessionCartStore::new(session)),
        }
    }
}

impl CartStore for ActiveCart<'_> {
    async fn get(&self) -> Result<Cart, CartError> {
        match self {
            Self::Guest(store) => store.get().await,
            Self::Account(store) => store.get().await,
        }
    }

    async fn add(&self, product_id: ProductId, quantity: Quantity) -> Result<Quantity, CartError> {
        match self {
            Self::Guest(store) => store.add(product_id, quantity).await,
            Self::Account(store) => store.add(product_id, quantity).await,
        }
    }

    async fn update(&self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        match self {
            Self::Guest(store) => store.update(product_id, quantity).await,
            Self::Account(store) => store.update(product_id, quantity).await,
        }
    }

    async fn remove(&self, product_id: ProductId) -> Result<bool, CartError> {
        match self {
            Self::Guest(store) => store.remove(product_id).await,
            Self::Account(store) => store.remove(product_id).await,
        }
    }

    async fn clear(&self) -> Result<(), CartError> {
        match self {
            Self::Guest(store) => store.clear().await,
            Self::Account(store) => store.clear().await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn guest_store() -> SessionCartStore {
        SessionCartStore::new(Session::new(None, Arc::new(MemoryStore::default()), None))
    }

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_guest_cart_starts_empty() {
        let store = guest_store();
        assert!(store.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guest_add_sums_and_persists() {
        let store = guest_store();
        let p = ProductId::new(7);

        store.add(p, qty(2)).await.unwrap();
        let total = store.add(p, qty(3)).await.unwrap();

        assert_eq!(total.get(), 5);
        assert_eq!(store.get().await.unwrap().quantity_of(p), Some(qty(5)));
    }

    #[tokio::test]
    async fn test_guest_update_zero_removes() {
        let store = guest_store();
        let p = ProductId::new(7);
        store.add(p, qty(2)).await.unwrap();

        store.update(p, 0).await.unwrap();

        assert!(store.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guest_update_above_cap_rejected() {
        let store = guest_store();
        let err = store.update(ProductId::new(1), 10_000).await.unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity(_)));
    }

    #[tokio::test]
    async fn test_guest_remove_reports_missing() {
        let store = guest_store();
        store.add(ProductId::new(1), qty(1)).await.unwrap();

        assert!(store.remove(ProductId::new(1)).await.unwrap());
        assert!(!store.remove(ProductId::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_take_empties_guest_cart() {
        let store = guest_store();
        store.add(ProductId::new(1), qty(4)).await.unwrap();

        let taken = store.take().await.unwrap();

        assert_eq!(taken.item_count(), 4);
        assert!(store.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_cart_without_user_is_guest() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let active = ActiveCart::select(&pool, session, None);
        active.add(ProductId::new(3), qty(1)).await.unwrap();

        assert!(matches!(active, ActiveCart::Guest(_)));
        assert_eq!(active.get().await.unwrap().len(), 1);
    }
}
