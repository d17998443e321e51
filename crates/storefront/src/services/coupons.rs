//! Coupon validation service.
//!
//! Validation is read-only: the usage counter is only touched when an order
//! is placed (see [`crate::db::coupons::redeem`]).

use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use bazaar_core::{Amount, Coupon, CouponCode, CouponCodeError, CouponValidation, Discount, Rejection};

use crate::db::{CouponRepository, RepositoryError};

/// Coupon lookup by code.
pub trait CouponStore: Send + Sync {
    fn find_by_code(
        &self,
        code: &CouponCode,
    ) -> impl Future<Output = Result<Option<Coupon>, RepositoryError>> + Send;
}

impl CouponStore for CouponRepository<'_> {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
        self.get_by_code(code).await
    }
}

/// Coupon validation service.
pub struct CouponService<S> {
    store: S,
}

impl<S: CouponStore> CouponService<S> {
    /// Create a new coupon service.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Check a shopper-entered code against a cart total.
    ///
    /// Blank input is [`Rejection::MissingCode`]. Input that can't be a code
    /// at all (bad characters, too long) is [`Rejection::NotFound`], the same
    /// as a well-formed code nobody created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` only if the lookup itself fails; every
    /// business rejection is in the inner `Result`.
    #[instrument(skip(self, now))]
    pub async fn check(
        &self,
        code: &str,
        cart_total: Amount,
        now: DateTime<Utc>,
    ) -> Result<Result<Discount, Rejection>, RepositoryError> {
        let code = match CouponCode::parse(code) {
            Ok(code) => code,
            Err(CouponCodeError::Empty) => return Ok(Err(Rejection::MissingCode)),
            Err(e) => {
                debug!(error = %e, "Malformed coupon code");
                return Ok(Err(Rejection::NotFound));
            }
        };

        let Some(coupon) = self.store.find_by_code(&code).await? else {
            return Ok(Err(Rejection::NotFound));
        };

        Ok(coupon.check(cart_total, now))
    }

    /// [`CouponService::check`] shaped as the validation response.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn validate(
        &self,
        code: &str,
        cart_total: Amount,
        now: DateTime<Utc>,
    ) -> Result<CouponValidation, RepositoryError> {
        let result = self.check(code, cart_total, now).await?;
        Ok(CouponValidation::from((cart_total, result)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chrono::Duration;
    use rust_decimal::Decimal;

    use bazaar_core::{CouponId, DiscountType};

    use super::*;

    /// In-memory coupons keyed by normalized code.
    #[derive(Default)]
    struct MemoryCoupons(Mutex<Vec<Coupon>>);

    impl MemoryCoupons {
        fn with(coupon: Coupon) -> Self {
            Self(Mutex::new(vec![coupon]))
        }

        fn redeem(&self, code: &str) {
            let mut coupons = self.0.lock().unwrap();
            let coupon = coupons.iter_mut().find(|c| c.code.as_str() == code).unwrap();
            coupon.used_count += 1;
        }
    }

    impl CouponStore for MemoryCoupons {
        async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
            Ok(self.0.lock().unwrap().iter().find(|c| &c.code == code).cloned())
        }
    }

    fn amount(units: i64) -> Amount {
        Amount::new(units).unwrap()
    }

    fn coupon(code: &str) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: CouponCode::parse(code).unwrap(),
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::new(5_000, 0),
            min_purchase_amount: None,
            max_discount_amount: None,
            usage_limit: None,
            used_count: 0,
            is_active: true,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_blank_code_is_missing() {
        let service = CouponService::new(MemoryCoupons::default());
        let v = service.validate("   ", amount(10_000), Utc::now()).await.unwrap();

        assert!(!v.valid);
        assert_eq!(v.message, "Please enter a coupon code");
        assert_eq!(v.final_total, amount(10_000));
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_codes_not_found() {
        let service = CouponService::new(MemoryCoupons::with(coupon("SAVE5K")));

        for input in ["NOPE", "save 5k", "💸"] {
            let result = service.check(input, amount(10_000), Utc::now()).await.unwrap();
            assert_eq!(result, Err(Rejection::NotFound), "input {input:?}");
        }
    }

    #[tokio::test]
    async fn test_code_lookup_ignores_case() {
        let service = CouponService::new(MemoryCoupons::with(coupon("SAVE5K")));

        let v = service.validate(" save5k ", amount(10_000), Utc::now()).await.unwrap();

        assert!(v.valid);
        assert_eq!(v.discount_amount, amount(5_000));
        assert_eq!(v.final_total, amount(5_000));
        assert_eq!(v.coupon_id, Some(CouponId::new(1)));
    }

    #[tokio::test]
    async fn test_each_rejection_has_its_own_message() {
        let now = Utc::now();

        let mut expired = coupon("OLD");
        expired.expires_at = Some(now - Duration::days(1));
        let mut inactive = coupon("OFF");
        inactive.is_active = false;

        let expired_msg = CouponService::new(MemoryCoupons::with(expired))
            .validate("OLD", amount(10_000), now)
            .await
            .unwrap()
            .message;
        let inactive_msg = CouponService::new(MemoryCoupons::with(inactive))
            .validate("OFF", amount(10_000), now)
            .await
            .unwrap()
            .message;
        let missing_msg = CouponService::new(MemoryCoupons::default())
            .validate("GONE", amount(10_000), now)
            .await
            .unwrap()
            .message;

        assert_eq!(expired_msg, "This coupon has expired");
        assert_eq!(inactive_msg, "This coupon is no longer active");
        assert_eq!(missing_msg, "Coupon code not found");
    }

    #[tokio::test]
    async fn test_validation_does_not_consume_until_redeemed() {
        let mut last_use = coupon("ONCE");
        last_use.usage_limit = Some(3);
        last_use.used_count = 2;
        let store = MemoryCoupons::with(last_use);
        let service = CouponService::new(store);

        for _ in 0..5 {
            let v = service.validate("ONCE", amount(10_000), Utc::now()).await.unwrap();
            assert!(v.valid);
        }

        service.store.redeem("ONCE");

        let result = service.check("ONCE", amount(10_000), Utc::now()).await.unwrap();
        assert_eq!(result, Err(Rejection::UsageLimitReached));
    }
}
