//! Coupon administration commands.
//!
//! Coupons are never deleted; retiring one means deactivating it so past
//! orders keep their reference.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use bazaar_core::{Amount, Coupon, CouponCode, DiscountType, NewCoupon};
use bazaar_storefront::db::{CouponRepository, RepositoryError};

use super::CliError;

/// Arguments for `coupon create`.
#[derive(Debug, Clone)]
pub struct CreateArgs {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_purchase: Option<i64>,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateArgs {
    /// Build and check the coupon these arguments describe.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is malformed, an amount is negative, or
    /// the discount rules are inconsistent.
    pub fn into_new_coupon(self) -> Result<NewCoupon, CliError> {
        let coupon = NewCoupon {
            code: CouponCode::parse(&self.code)?,
            discount_type: self.discount_type,
            discount_value: self.value,
            min_purchase_amount: self.min_purchase.map(Amount::new).transpose()?,
            max_discount_amount: self.max_discount.map(Amount::new).transpose()?,
            usage_limit: self.usage_limit,
            expires_at: self.expires_at,
        };
        coupon.validate()?;
        Ok(coupon)
    }
}

/// Create a new coupon.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, the code already exists,
/// or the database is unreachable.
pub async fn create(args: CreateArgs) -> Result<(), CliError> {
    // Validate before connecting to the database
    let new_coupon = args.into_new_coupon()?;

    let pool = super::connect().await?;
    let coupon = CouponRepository::new(&pool).create(&new_coupon).await?;

    info!(
        id = %coupon.id,
        code = %coupon.code,
        rule = %describe(&coupon),
        "Coupon created"
    );

    Ok(())
}

/// Activate or deactivate a coupon by code.
///
/// # Errors
///
/// Returns an error if the coupon does not exist or the database is
/// unreachable.
pub async fn set_active(code: &str, is_active: bool) -> Result<(), CliError> {
    let code = CouponCode::parse(code)?;

    let pool = super::connect().await?;
    match CouponRepository::new(&pool).set_active(&code, is_active).await {
        Ok(()) => {}
        Err(RepositoryError::NotFound) => return Err(CliError::CouponNotFound(code.to_string())),
        Err(e) => return Err(e.into()),
    }

    if is_active {
        info!(code = %code, "Coupon activated");
    } else {
        info!(code = %code, "Coupon deactivated");
    }

    Ok(())
}

/// List all coupons with their usage.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn list() -> Result<(), CliError> {
    let pool = super::connect().await?;
    let coupons = CouponRepository::new(&pool).list().await?;

    if coupons.is_empty() {
        info!("No coupons found");
        return Ok(());
    }

    for coupon in &coupons {
        info!(
            code = %coupon.code,
            rule = %describe(coupon),
            used = %usage(coupon),
            active = coupon.is_active,
            expires_at = ?coupon.expires_at,
        );
    }

    info!(count = coupons.len(), "Listed coupons");

    Ok(())
}

/// One-line summary of a coupon's discount rule.
fn describe(coupon: &Coupon) -> String {
    let mut rule = match coupon.discount_type {
        DiscountType::Percentage => format!("{}% off", coupon.discount_value.normalize()),
        DiscountType::Fixed => format!("{} off", coupon.discount_value.normalize()),
    };
    if let Some(max) = coupon.max_discount_amount {
        rule.push_str(&format!(", up to {max}"));
    }
    if let Some(min) = coupon.min_purchase_amount {
        rule.push_str(&format!(", min purchase {min}"));
    }
    rule
}

fn usage(coupon: &Coupon) -> String {
    coupon.usage_limit.map_or_else(
        || format!("{}/unlimited", coupon.used_count),
        |limit| format!("{}/{limit}", coupon.used_count),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{CouponCodeError, CouponId, CouponRuleError};

    use super::*;

    fn args() -> CreateArgs {
        CreateArgs {
            code: " spring15 ".to_string(),
            discount_type: DiscountType::Percentage,
            value: Decimal::new(15, 0),
            min_purchase: None,
            max_discount: Some(20_000),
            usage_limit: Some(100),
            expires_at: None,
        }
    }

    fn coupon(new: NewCoupon) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: new.code,
            discount_type: new.discount_type,
            discount_value: new.discount_value,
            min_purchase_amount: new.min_purchase_amount,
            max_discount_amount: new.max_discount_amount,
            usage_limit: new.usage_limit,
            used_count: 3,
            is_active: true,
            expires_at: new.expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_into_new_coupon_normalizes_code() {
        let coupon = args().into_new_coupon().unwrap();
        assert_eq!(coupon.code.as_str(), "SPRING15");
        assert_eq!(coupon.max_discount_amount, Some(Amount::new(20_000).unwrap()));
    }

    #[test]
    fn test_into_new_coupon_rejects_bad_code() {
        let err = CreateArgs {
            code: "   ".to_string(),
            ..args()
        }
        .into_new_coupon()
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidCode(CouponCodeError::Empty)));
    }

    #[test]
    fn test_into_new_coupon_rejects_negative_amount() {
        let err = CreateArgs {
            min_purchase: Some(-1),
            ..args()
        }
        .into_new_coupon()
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidAmount(_)));
    }

    #[test]
    fn test_into_new_coupon_rejects_inconsistent_rules() {
        let err = CreateArgs {
            discount_type: DiscountType::Fixed,
            value: Decimal::new(5000, 0),
            ..args()
        }
        .into_new_coupon()
        .unwrap_err();
        assert!(matches!(
            err,
            CliError::InvalidCoupon(CouponRuleError::MaxDiscountOnFixed)
        ));
    }

    #[test]
    fn test_describe_and_usage() {
        let c = coupon(args().into_new_coupon().unwrap());
        assert_eq!(describe(&c), "15% off, up to 20,000");
        assert_eq!(usage(&c), "3/100");

        let unlimited = Coupon {
            usage_limit: None,
            ..c
        };
        assert_eq!(usage(&unlimited), "3/unlimited");
    }
}
