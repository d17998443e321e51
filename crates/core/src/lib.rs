//! Bazaar Core - Shared domain types and rules.
//!
//! This crate provides the domain types used across all Bazaar components:
//! - `storefront` - Public-facing cart, coupon and order API
//! - `cli` - Command-line tools for migrations, coupons and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. Cart reconciliation and coupon discount computation live
//! here so they can be tested without a running database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, amounts, quantities and statuses
//! - [`cart`] - Cart lines, cart mutation and guest/account merge
//! - [`coupon`] - Coupon codes, eligibility checks and discount computation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod coupon;
pub mod types;

pub use cart::{Cart, CartLine, MergeOutcome, merge};
pub use coupon::{
    Coupon, CouponCode, CouponCodeError, CouponRuleError, CouponValidation, Discount, NewCoupon,
    Rejection,
};
pub use types::*;
