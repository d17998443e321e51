//! Domain models for storefront.
//!
//! Pure domain types (carts, coupons, IDs) live in `bazaar_core`; the types
//! here are specific to the storefront's catalog, orders and session.

pub mod cart;
pub mod order;
pub mod product;
pub mod session;

pub use cart::{MergeResponse, PricedCart, PricedLine};
pub use order::{AppliedCoupon, NewOrder, Order, OrderLine};
pub use product::{Product, ProductSeed};
pub use session::CurrentUser;
