//! Cart line quantities.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Cart lines must hold at least one unit.
    #[error("quantity must be at least 1")]
    Zero,
    /// Above the per-line cap.
    #[error("quantity must be at most {max} (got {got})")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
        /// Requested quantity.
        got: u32,
    },
}

/// A positive number of units on a single cart line.
///
/// ## Constraints
///
/// - At least 1 (a line with zero units does not exist)
/// - At most [`Quantity::MAX_PER_LINE`]
///
/// Arithmetic that would exceed the cap clamps to it instead of failing,
/// so merging two large carts never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Per-line cap.
    pub const MAX_PER_LINE: u32 = 9_999;

    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Largest allowed quantity.
    pub const MAX: Self = Self(Self::MAX_PER_LINE);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Zero` for 0 and `QuantityError::TooLarge`
    /// above [`Quantity::MAX_PER_LINE`].
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            return Err(QuantityError::Zero);
        }
        if value > Self::MAX_PER_LINE {
            return Err(QuantityError::TooLarge {
                max: Self::MAX_PER_LINE,
                got: value,
            });
        }
        Ok(Self(value))
    }

    /// Number of units.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Sum two quantities, clamping at the per-line cap.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        let sum = self.0.saturating_add(other.0);
        if sum > Self::MAX_PER_LINE {
            Self::MAX
        } else {
            Self(sum)
        }
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        // Negative database values are as invalid as zero.
        u32::try_from(value).map_or(Err(QuantityError::Zero), Self::new)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl From<Quantity> for i32 {
    fn from(quantity: Quantity) -> Self {
        // MAX_PER_LINE fits comfortably in i32.
        i32::try_from(quantity.0).unwrap_or(i32::MAX)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rejected() {
        assert_eq!(Quantity::new(0), Err(QuantityError::Zero));
    }

    #[test]
    fn test_above_cap_rejected() {
        assert!(matches!(
            Quantity::new(10_000),
            Err(QuantityError::TooLarge { max: 9_999, .. })
        ));
    }

    #[test]
    fn test_saturating_add_clamps() {
        let a = Quantity::new(9_000).unwrap();
        let b = Quantity::new(5_000).unwrap();
        assert_eq!(a.saturating_add(b), Quantity::MAX);
        assert_eq!(
            Quantity::new(2).unwrap().saturating_add(Quantity::ONE),
            Quantity::new(3).unwrap()
        );
    }

    #[test]
    fn test_negative_database_value_rejected() {
        assert!(Quantity::try_from(-3_i32).is_err());
        assert_eq!(Quantity::try_from(4_i32).unwrap().get(), 4);
    }
}
