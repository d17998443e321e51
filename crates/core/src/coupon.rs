//! Coupon codes, eligibility checks and discount computation.
//!
//! Applying a coupon is two-phase:
//!
//! 1. **Validate** - [`Coupon::check`] is a pure function of the coupon, the
//!    cart total and the clock. It can run any number of times (a shopper
//!    re-typing a code) without consuming the coupon.
//! 2. **Commit** - the usage counter is incremented exactly once, when the
//!    order is placed, by a conditional update in the database. That lives in
//!    the storefront's order repository, not here.
//!
//! Every rejection is a [`Rejection`] value with a shopper-facing message,
//! never an error.

use core::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Amount, CouponId, DiscountType};

// =============================================================================
// Coupon Code
// =============================================================================

/// Errors that can occur when parsing a [`CouponCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponCodeError {
    /// The input is empty or only whitespace.
    #[error("coupon code cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("coupon code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `A-Z`, `0-9`, `-` and `_`.
    #[error("coupon code contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A normalized coupon code.
///
/// Codes are case-insensitive: parsing trims surrounding whitespace and
/// uppercases, so `" summer10 "` and `"SUMMER10"` are the same code.
///
/// ## Examples
///
/// ```
/// use bazaar_core::CouponCode;
///
/// let code = CouponCode::parse("  welcome-10 ").unwrap();
/// assert_eq!(code.as_str(), "WELCOME-10");
/// assert!(CouponCode::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Maximum length of a coupon code.
    pub const MAX_LENGTH: usize = 64;

    /// Parse and normalize a coupon code.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than
    /// [`CouponCode::MAX_LENGTH`], or contains characters other than ASCII
    /// letters, digits, `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, CouponCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CouponCodeError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(CouponCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(CouponCodeError::InvalidCharacter(bad));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// A stored coupon and its eligibility rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    pub id: CouponId,
    pub code: CouponCode,
    pub discount_type: DiscountType,
    /// Percent (0-100] for `Percentage`, whole currency units for `Fixed`.
    pub discount_value: Decimal,
    pub min_purchase_amount: Option<Amount>,
    /// Cap on a `Percentage` discount.
    pub max_discount_amount: Option<Amount>,
    /// `None` means unlimited.
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No code was entered.
    MissingCode,
    /// No coupon exists with this code.
    NotFound,
    /// The coupon was deactivated.
    Inactive,
    /// `expires_at` has passed.
    Expired,
    /// The cart total is below `min_purchase_amount`.
    BelowMinimum {
        /// Required minimum cart total.
        minimum: Amount,
    },
    /// `used_count` has reached `usage_limit`.
    UsageLimitReached,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCode => write!(f, "Please enter a coupon code"),
            Self::NotFound => write!(f, "Coupon code not found"),
            Self::Inactive => write!(f, "This coupon is no longer active"),
            Self::Expired => write!(f, "This coupon has expired"),
            Self::BelowMinimum { minimum } => write!(
                f,
                "A minimum purchase of {minimum} is required to use this coupon"
            ),
            Self::UsageLimitReached => write!(f, "This coupon has reached its usage limit"),
        }
    }
}

/// A coupon that passed every eligibility check against a cart total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discount {
    pub coupon_id: CouponId,
    pub code: CouponCode,
    pub amount: Amount,
    pub final_total: Amount,
}

impl Discount {
    /// Confirmation shown to the shopper.
    #[must_use]
    pub fn message(&self) -> String {
        format!("Coupon {} applied: you save {}", self.code, self.amount)
    }
}

impl Coupon {
    /// Check eligibility against `cart_total` at time `now`.
    ///
    /// Checks run in a fixed order (active, expiry, minimum purchase, usage
    /// limit) so the shopper sees the most fundamental problem first.
    ///
    /// # Errors
    ///
    /// Returns the first [`Rejection`] that applies.
    pub fn check(&self, cart_total: Amount, now: DateTime<Utc>) -> Result<Discount, Rejection> {
        if !self.is_active {
            return Err(Rejection::Inactive);
        }
        if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(Rejection::Expired);
        }
        if let Some(minimum) = self.min_purchase_amount
            && cart_total < minimum
        {
            return Err(Rejection::BelowMinimum { minimum });
        }
        if self.is_exhausted() {
            return Err(Rejection::UsageLimitReached);
        }

        let amount = self.discount_for(cart_total);
        Ok(Discount {
            coupon_id: self.id,
            code: self.code.clone(),
            amount,
            final_total: cart_total.saturating_sub(amount),
        })
    }

    /// Discount this coupon gives on `cart_total`, ignoring eligibility.
    ///
    /// - `Percentage`: `floor(total × value / 100)`, capped at
    ///   `max_discount_amount` when set.
    /// - `Fixed`: `floor(value)`.
    ///
    /// Either way the result never exceeds `cart_total`.
    #[must_use]
    pub fn discount_for(&self, cart_total: Amount) -> Amount {
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let pct = cart_total
                    .percent_floor(self.discount_value)
                    .unwrap_or(cart_total);
                self.max_discount_amount.map_or(pct, |max| pct.min(max))
            }
            DiscountType::Fixed => Amount::from_decimal_floor(self.discount_value),
        };
        raw.min(cart_total)
    }

    /// `true` once `used_count` has reached `usage_limit`.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .is_some_and(|limit| self.used_count >= limit)
    }
}

// =============================================================================
// Validation Result
// =============================================================================

/// Outcome of validating a coupon code against a cart total.
///
/// This is the `POST /coupons/validate` response body. Rejections carry
/// `valid: false`, a zero discount and the untouched total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidation {
    pub valid: bool,
    pub message: String,
    pub discount_amount: Amount,
    pub final_total: Amount,
    pub coupon_id: Option<CouponId>,
}

impl CouponValidation {
    #[must_use]
    pub fn accepted(discount: &Discount) -> Self {
        Self {
            valid: true,
            message: discount.message(),
            discount_amount: discount.amount,
            final_total: discount.final_total,
            coupon_id: Some(discount.coupon_id),
        }
    }

    #[must_use]
    pub fn rejected(cart_total: Amount, rejection: Rejection) -> Self {
        Self {
            valid: false,
            message: rejection.to_string(),
            discount_amount: Amount::ZERO,
            final_total: cart_total,
            coupon_id: None,
        }
    }
}

impl From<(Amount, Result<Discount, Rejection>)> for CouponValidation {
    fn from((cart_total, result): (Amount, Result<Discount, Rejection>)) -> Self {
        match result {
            Ok(discount) => Self::accepted(&discount),
            Err(rejection) => Self::rejected(cart_total, rejection),
        }
    }
}

// =============================================================================
// New Coupon
// =============================================================================

/// Errors in the rules of a coupon being created.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponRuleError {
    #[error("discount value must be greater than zero")]
    NonPositiveValue,
    #[error("percentage discount must be at most 100 (got {0})")]
    PercentageAboveHundred(Decimal),
    #[error("fixed discount must be a whole amount (got {0})")]
    FractionalFixedAmount(Decimal),
    #[error("usage limit must be at least 1")]
    ZeroUsageLimit,
    #[error("max discount amount only applies to percentage coupons")]
    MaxDiscountOnFixed,
}

/// Rules for a coupon an administrator is creating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCoupon {
    pub code: CouponCode,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase_amount: Option<Amount>,
    pub max_discount_amount: Option<Amount>,
    pub usage_limit: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewCoupon {
    /// Check the rules are self-consistent.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRuleError`] found.
    pub fn validate(&self) -> Result<(), CouponRuleError> {
        if self.discount_value <= Decimal::ZERO {
            return Err(CouponRuleError::NonPositiveValue);
        }
        match self.discount_type {
            DiscountType::Percentage => {
                if self.discount_value > Decimal::ONE_HUNDRED {
                    return Err(CouponRuleError::PercentageAboveHundred(self.discount_value));
                }
            }
            DiscountType::Fixed => {
                if !self.discount_value.fract().is_zero() {
                    return Err(CouponRuleError::FractionalFixedAmount(self.discount_value));
                }
                if self.max_discount_amount.is_some() {
                    return Err(CouponRuleError::MaxDiscountOnFixed);
                }
            }
        }
        if self.usage_limit == Some(0) {
            return Err(CouponRuleError::ZeroUsageLimit);
        }
        Ok(())
    }
}
