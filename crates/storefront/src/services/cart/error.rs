//! Cart error types.

use thiserror::Error;

use bazaar_core::{ProductId, QuantityError};

use crate::db::RepositoryError;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity is zero where a positive one is required, or above the cap.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// No product exists with this ID.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The product exists but is no longer sold.
    #[error("product {0} is no longer available")]
    ProductUnavailable(ProductId),

    /// Reading or writing the guest cart in the session failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
