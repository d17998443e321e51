//! Monetary amounts in whole currency units.
//!
//! The store sells in a currency without fractional units, so every price,
//! subtotal and discount is a non-negative integer. Fractional intermediate
//! results (percentage discounts) are floored back to whole units.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::Quantity;

/// Errors that can occur when constructing an [`Amount`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    /// The value is below zero.
    #[error("amount cannot be negative (got {0})")]
    Negative(i64),
}

/// A non-negative amount of money in whole currency units.
///
/// ## Examples
///
/// ```
/// use bazaar_core::Amount;
///
/// let total = Amount::new(1_000_000).unwrap();
/// assert_eq!(total.to_string(), "1,000,000");
/// assert!(Amount::new(-1).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Zero units.
    pub const ZERO: Self = Self(0);

    /// Largest representable amount.
    pub const MAX: Self = Self(i64::MAX);

    /// Create an amount from whole currency units.
    ///
    /// # Errors
    ///
    /// Returns `AmountError::Negative` if `units` is below zero.
    pub const fn new(units: i64) -> Result<Self, AmountError> {
        if units < 0 {
            return Err(AmountError::Negative(units));
        }
        Ok(Self(units))
    }

    /// Whole currency units.
    #[must_use]
    pub const fn units(self) -> i64 {
        self.0
    }

    /// Returns `true` for a zero amount.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Add two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Subtract, stopping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let diff = self.0.saturating_sub(other.0);
        if diff < 0 { Self::ZERO } else { Self(diff) }
    }

    /// Price of `quantity` units at `self` each, `None` on overflow.
    #[must_use]
    pub fn times(self, quantity: Quantity) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity.get())).map(Self)
    }

    /// `percent`% of this amount, floored to whole units.
    ///
    /// Returns `None` if the intermediate product overflows the decimal range.
    /// A negative percentage yields zero.
    #[must_use]
    pub fn percent_floor(self, percent: Decimal) -> Option<Self> {
        let scaled = Decimal::from(self.0)
            .checked_mul(percent)?
            .checked_div(Decimal::ONE_HUNDRED)?;
        Some(Self::from_decimal_floor(scaled))
    }

    /// Floor a decimal value to whole units.
    ///
    /// Negative values become zero; values beyond `i64` saturate at [`Amount::MAX`].
    #[must_use]
    pub fn from_decimal_floor(value: Decimal) -> Self {
        if value.is_sign_negative() {
            return Self::ZERO;
        }
        value.floor().to_i64().map_or(Self::MAX, Self)
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(units: i64) -> Result<Self, Self::Error> {
        Self::new(units)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    /// Formats with comma thousands separators (e.g. `1,250,000`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        f.write_str(&grouped)
    }
}
