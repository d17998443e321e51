//! Cart lines, cart mutation and guest/account reconciliation.
//!
//! A [`Cart`] holds at most one [`CartLine`] per product, and every line
//! holds a positive [`Quantity`]. Prices are not stored here: totals are
//! derived at read time from the current catalog.
//!
//! [`merge`] reconciles a guest cart into an account cart when a shopper
//! logs in. Quantities for the same product are *summed*, so merge must run
//! exactly once per guest cart; callers clear the guest cart immediately
//! after a successful merge.

use serde::{Deserialize, Serialize};

use crate::types::{ProductId, Quantity, QuantityError};

/// A product and how many units of it are in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl CartLine {
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// An ordered set of cart lines, unique by product.
///
/// Line order is insertion order, which keeps the cart stable for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from arbitrary lines, folding duplicate products by
    /// summing their quantities.
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add(line.product_id, line.quantity);
        }
        cart
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity.get()))
    }

    /// Quantity held for `product_id`, if it is in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<Quantity> {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
    }

    /// Product IDs in line order.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.lines.iter().map(|line| line.product_id)
    }

    /// Add units of a product, summing into an existing line.
    ///
    /// Returns the line's new quantity (clamped to the per-line cap).
    pub fn add(&mut self, product_id: ProductId, quantity: Quantity) -> Quantity {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            line.quantity = line.quantity.saturating_add(quantity);
            return line.quantity;
        }
        self.lines.push(CartLine::new(product_id, quantity));
        quantity
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// Setting a quantity for a product not yet in the cart adds it.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::TooLarge` above the per-line cap.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), QuantityError> {
        if quantity == 0 {
            self.remove(product_id);
            return Ok(());
        }
        let quantity = Quantity::new(quantity)?;
        match self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => line.quantity = quantity,
            None => self.lines.push(CartLine::new(product_id, quantity)),
        }
        Ok(())
    }

    /// Remove a product's line. Returns `false` if it was not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Drop lines whose product fails `is_available`, returning the dropped IDs.
    pub fn retain_available(&mut self, is_available: impl Fn(ProductId) -> bool) -> Vec<ProductId> {
        let mut dropped = Vec::new();
        self.lines.retain(|line| {
            let keep = is_available(line.product_id);
            if !keep {
                dropped.push(line.product_id);
            }
            keep
        });
        dropped
    }
}

/// Result of reconciling a guest cart into an account cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The reconciled cart that replaces the account cart.
    pub cart: Cart,
    /// Products removed because they no longer exist or were discontinued.
    pub dropped: Vec<ProductId>,
    /// `false` when the guest cart was empty and the account cart is untouched.
    pub changed: bool,
}

/// Reconcile guest (`local`) lines into account (`server`) lines.
///
/// - Quantities for a product present on both sides are summed.
/// - A product on one side only carries through unchanged.
/// - Duplicate products within `local` are folded together.
/// - Products failing `is_available` are dropped and reported.
/// - An empty `local` is a no-op: the server lines come back as-is and
///   `changed` is `false`.
///
/// Account lines keep their order; products new to the account are appended
/// in guest order.
pub fn merge(
    local: &[CartLine],
    server: &[CartLine],
    is_available: impl Fn(ProductId) -> bool,
) -> MergeOutcome {
    if local.is_empty() {
        return MergeOutcome {
            cart: Cart::from_lines(server.iter().copied()),
            dropped: Vec::new(),
            changed: false,
        };
    }

    // Folding first means each unavailable product is reported once.
    let mut cart = Cart::from_lines(server.iter().chain(local).copied());
    let dropped = cart.retain_available(is_available);

    MergeOutcome {
        cart,
        dropped,
        changed: true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: i32, quantity: u32) -> CartLine {
        CartLine::new(ProductId::new(product), Quantity::new(quantity).unwrap())
    }

    fn quantities(cart: &Cart) -> Vec<(i32, u32)> {
        cart.lines()
            .iter()
            .map(|l| (l.product_id.as_i32(), l.quantity.get()))
            .collect()
    }

    const fn all_available(_: ProductId) -> bool {
        true
    }

    // =========================================================================
    // Cart mutation
    // =========================================================================

    #[test]
    fn test_add_sums_existing_line() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1), Quantity::new(2).unwrap());
        let qty = cart.add(ProductId::new(1), Quantity::new(3).unwrap());
        assert_eq!(qty.get(), 5);
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = Cart::from_lines([line(1, 2), line(2, 1)]);
        cart.set_quantity(ProductId::new(1), 0).unwrap();
        assert_eq!(quantities(&cart), vec![(2, 1)]);
    }

    #[test]
    fn test_set_quantity_replaces_not_sums() {
        let mut cart = Cart::from_lines([line(1, 2)]);
        cart.set_quantity(ProductId::new(1), 7).unwrap();
        assert_eq!(quantities(&cart), vec![(1, 7)]);
    }

    #[test]
    fn test_set_quantity_above_cap_fails_and_keeps_line() {
        let mut cart = Cart::from_lines([line(1, 2)]);
        assert!(cart.set_quantity(ProductId::new(1), 20_000).is_err());
        assert_eq!(quantities(&cart), vec![(1, 2)]);
    }

    #[test]
    fn test_remove_absent_product_is_noop() {
        let mut cart = Cart::from_lines([line(1, 2)]);
        assert!(!cart.remove(ProductId::new(99)));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_item_count() {
        let cart = Cart::from_lines([line(1, 2), line(2, 3)]);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_session_round_trip_format() {
        let cart = Cart::from_lines([line(4, 2)]);
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "lines": [{ "productId": "4", "quantity": 2 }] })
        );
    }

    #[test]
    fn test_lines_accept_string_product_ids() {
        let lines: Vec<CartLine> =
            serde_json::from_str(r#"[{"productId":"5","quantity":2},{"productId":6,"quantity":1}]"#)
                .unwrap();
        assert_eq!(lines, vec![line(5, 2), line(6, 1)]);
    }

    // =========================================================================
    // Merge
    // =========================================================================

    #[test]
    fn test_merge_sums_overlapping_products() {
        let local = [line(1, 2), line(2, 1)];
        let server = [line(1, 3), line(3, 4)];

        let outcome = merge(&local, &server, all_available);

        assert!(outcome.changed);
        assert!(outcome.dropped.is_empty());
        assert_eq!(quantities(&outcome.cart), vec![(1, 5), (3, 4), (2, 1)]);
    }

    #[test]
    fn test_merge_every_product_gets_sum_of_both_sides() {
        let local = [line(1, 1), line(2, 2), line(5, 9)];
        let server = [line(2, 3), line(4, 1), line(5, 1)];

        let outcome = merge(&local, &server, all_available);

        for id in [1, 2, 4, 5] {
            let pid = ProductId::new(id);
            let sum_of = |lines: &[CartLine]| -> u32 {
                lines
                    .iter()
                    .filter(|l| l.product_id == pid)
                    .map(|l| l.quantity.get())
                    .sum()
            };
            let expected = sum_of(&local) + sum_of(&server);
            assert_eq!(outcome.cart.quantity_of(pid).unwrap().get(), expected);
        }
    }

    #[test]
    fn test_merge_empty_local_is_noop() {
        let server = [line(1, 3), line(2, 1)];

        let outcome = merge(&[], &server, all_available);

        assert!(!outcome.changed);
        assert_eq!(outcome.cart.lines(), &server);
    }

    #[test]
    fn test_merge_empty_server_yields_local() {
        let local = [line(1, 3), line(2, 1)];

        let outcome = merge(&local, &[], all_available);

        assert!(outcome.changed);
        assert_eq!(outcome.cart.lines(), &local);
    }

    #[test]
    fn test_merge_folds_duplicate_local_lines() {
        let local = [line(7, 1), line(7, 2)];
        let server = [line(7, 1)];

        let outcome = merge(&local, &server, all_available);

        assert_eq!(quantities(&outcome.cart), vec![(7, 4)]);
    }

    #[test]
    fn test_merge_drops_and_reports_unavailable_products() {
        let local = [line(1, 1), line(2, 1), line(2, 1)];
        let server = [line(3, 1)];

        let outcome = merge(&local, &server, |id| id != ProductId::new(2));

        assert_eq!(outcome.dropped, vec![ProductId::new(2)]);
        assert_eq!(quantities(&outcome.cart), vec![(3, 1), (1, 1)]);
    }

    #[test]
    fn test_merge_clamps_at_line_cap() {
        let local = [line(1, 9_000)];
        let server = [line(1, 9_000)];

        let outcome = merge(&local, &server, all_available);

        assert_eq!(outcome.cart.quantity_of(ProductId::new(1)), Some(Quantity::MAX));
    }
}
