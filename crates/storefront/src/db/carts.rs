//! Account cart repository.
//!
//! Authenticated shoppers' carts are stored one row per product in
//! `storefront.cart_line`. `position` preserves the order lines were added.

use std::collections::HashSet;

use sqlx::{PgConnection, PgPool};

use bazaar_core::{Cart, CartLine, MergeOutcome, ProductId, Quantity, UserId};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    quantity: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid quantity for product {}: {e}",
                row.product_id
            ))
        })?;
        Ok(Self::new(row.product_id, quantity))
    }
}

/// Repository for account cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's cart. A user with no lines has an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored quantity is invalid.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_lines(&mut conn, user_id, false).await
    }

    /// Add units of a product, summing into an existing line (clamped to the
    /// per-line cap). Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Quantity, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_cart(&mut tx, user_id).await?;

        let new_quantity: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.cart_line (user_id, product_id, quantity, position)
            VALUES (
                $1, $2, $3,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM storefront.cart_line WHERE user_id = $1)
            )
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET quantity = LEAST(storefront.cart_line.quantity + EXCLUDED.quantity, $4),
                updated_at = NOW()
            RETURNING quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(i32::from(quantity))
        .bind(i32::from(Quantity::MAX))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Quantity::try_from(new_quantity)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid quantity: {e}")))
    }

    /// Set a line's quantity, creating the line if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_cart(&mut tx, user_id).await?;

        sqlx::query(
            r"
            INSERT INTO storefront.cart_line (user_id, product_id, quantity, position)
            VALUES (
                $1, $2, $3,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM storefront.cart_line WHERE user_id = $1)
            )
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET quantity = EXCLUDED.quantity,
                updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(i32::from(quantity))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a product's line.
    ///
    /// # Returns
    ///
    /// Returns `true` if a line was removed, `false` if it wasn't in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_cart(&mut tx, user_id).await?;

        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_line
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every line from a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_cart(&mut tx, user_id).await?;

        sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Merge guest lines into the user's cart and persist the result.
    ///
    /// Runs in one transaction: the user's existing lines are locked, summed
    /// with `local` via [`bazaar_core::merge`], filtered against the active
    /// catalog, and written back. An empty `local` writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails (the
    /// transaction is rolled back and the account cart is unchanged).
    pub async fn merge(
        &self,
        user_id: UserId,
        local: &[CartLine],
    ) -> Result<MergeOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_cart(&mut tx, user_id).await?;
        let server = load_lines(&mut tx, user_id, true).await?;
        let available = if local.is_empty() {
            HashSet::new()
        } else {
            available_products(&mut tx, &server, local).await?
        };

        let outcome = bazaar_core::merge(local, server.lines(), |id| available.contains(&id));
        if outcome.changed {
            replace_lines(&mut tx, user_id, &outcome.cart).await?;
        }

        tx.commit().await?;

        Ok(outcome)
    }
}

/// Advisory lock namespace for cart-rewriting transactions.
const CART_LOCK_NAMESPACE: i32 = 0x0CA7;

/// Serialize cart writes for one user.
///
/// Row locks alone can't cover lines that don't exist yet, so every account
/// cart write, merge and order placement takes this lock first. It is
/// released when the transaction ends.
pub(crate) async fn lock_cart(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(CART_LOCK_NAMESPACE)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Load a user's lines in display order, optionally locking them.
async fn load_lines(
    conn: &mut PgConnection,
    user_id: UserId,
    for_update: bool,
) -> Result<Cart, RepositoryError> {
    let sql = if for_update {
        r"
        SELECT product_id, quantity
        FROM storefront.cart_line
        WHERE user_id = $1
        ORDER BY position, product_id
        FOR UPDATE
        "
    } else {
        r"
        SELECT product_id, quantity
        FROM storefront.cart_line
        WHERE user_id = $1
        ORDER BY position, product_id
        "
    };

    let rows = sqlx::query_as::<_, CartLineRow>(sql)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    let lines = rows
        .into_iter()
        .map(CartLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart::from_lines(lines))
}

/// Which of the products on either side of a merge are still sold.
async fn available_products(
    conn: &mut PgConnection,
    server: &Cart,
    local: &[CartLine],
) -> Result<HashSet<ProductId>, RepositoryError> {
    let candidates: Vec<ProductId> = server
        .product_ids()
        .chain(local.iter().map(|line| line.product_id))
        .collect();

    let available: Vec<ProductId> = sqlx::query_scalar(
        r"
        SELECT id FROM storefront.product
        WHERE id = ANY($1) AND is_active
        ",
    )
    .bind(&candidates)
    .fetch_all(&mut *conn)
    .await?;

    Ok(available.into_iter().collect())
}

/// Replace all of a user's lines with `cart`, preserving its line order.
async fn replace_lines(
    conn: &mut PgConnection,
    user_id: UserId,
    cart: &Cart,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if cart.is_empty() {
        return Ok(());
    }

    let product_ids: Vec<ProductId> = cart.product_ids().collect();
    let quantities: Vec<i32> = cart.lines().iter().map(|l| i32::from(l.quantity)).collect();

    sqlx::query(
        r"
        INSERT INTO storefront.cart_line (user_id, product_id, quantity, position)
        SELECT $1, t.product_id, t.quantity, (t.ord - 1)::INTEGER
        FROM UNNEST($2::INTEGER[], $3::INTEGER[]) WITH ORDINALITY AS t(product_id, quantity, ord)
        ",
    )
    .bind(user_id)
    .bind(&product_ids)
    .bind(&quantities)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
