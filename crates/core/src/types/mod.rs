//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod quantity;
pub mod status;

pub use id::*;
pub use money::{Amount, AmountError};
pub use quantity::{Quantity, QuantityError};
pub use status::*;
