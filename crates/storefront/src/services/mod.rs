//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Guest and account carts behind one [`cart::CartStore`] interface,
//!   pricing, and guest-to-account merge at login
//! - `coupons` - Read-only coupon validation
//! - `checkout` - Order placement with atomic coupon redemption

pub mod cart;
pub mod checkout;
pub mod coupons;

pub use cart::{ActiveCart, CartError, CartService, CartStore, SessionCartStore};
pub use checkout::{CheckoutError, CheckoutService};
pub use coupons::{CouponService, CouponStore};
