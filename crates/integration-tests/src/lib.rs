//! Integration tests for Bazaar.
//!
//! # Running Tests
//!
//! ```bash
//! # Point at a PostgreSQL database (migrations are applied automatically)
//! export TEST_DATABASE_URL=postgres://localhost/bazaar_test
//!
//! # Run integration tests
//! cargo test -p bazaar-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_merge` - Guest-to-account cart merge against `PostgreSQL`
//! - `coupon_redemption` - Coupon validation, redemption and order placement
//! - `storefront_http` - Requests against a running storefront server
//!
//! Every test creates its own products, coupons and user IDs tagged with a
//! random suffix, so tests can share one database and run in parallel.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use bazaar_core::{Amount, Coupon, CouponCode, DiscountType, NewCoupon, UserId};
use bazaar_storefront::db::{self, CouponRepository, ProductRepository};
use bazaar_storefront::models::{CurrentUser, Product, ProductSeed};

/// Base URL of a running storefront (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Shared setup for database-backed tests.
pub struct TestContext {
    pub pool: PgPool,
    tag: String,
}

impl TestContext {
    /// Connect to the test database and apply migrations.
    ///
    /// # Panics
    ///
    /// Panics if `TEST_DATABASE_URL` (or `DATABASE_URL`) is unset or the
    /// database is unreachable.
    pub async fn new() -> Self {
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("TEST_DATABASE_URL not set");

        let pool = db::create_pool(&SecretString::from(url))
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("../storefront/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let tag = Uuid::new_v4().simple().to_string();
        Self {
            pool,
            tag: tag.chars().take(8).collect::<String>().to_uppercase(),
        }
    }

    /// A user no other test will use.
    #[must_use]
    pub fn user(&self) -> CurrentUser {
        let n = Uuid::new_v4().as_u128() % 1_000_000_000;
        CurrentUser {
            id: UserId::new(i32::try_from(n).unwrap_or(i32::MAX)),
            email: format!("shopper-{}@example.com", self.tag.to_lowercase()),
        }
    }

    /// Create a product whose SKU is unique to this context.
    ///
    /// # Panics
    ///
    /// Panics if the insert fails.
    pub async fn product(&self, name: &str, price: i64, is_active: bool) -> Product {
        let seed = ProductSeed {
            sku: format!("{}-{}", name.to_uppercase().replace(' ', "-"), self.tag),
            name: name.to_string(),
            price: Amount::new(price).expect("price must not be negative"),
            is_active,
        };
        ProductRepository::new(&self.pool)
            .upsert(&seed)
            .await
            .expect("Failed to create product")
    }

    /// A coupon code unique to this context.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` contains characters not allowed in a code.
    #[must_use]
    pub fn coupon_code(&self, prefix: &str) -> CouponCode {
        CouponCode::parse(&format!("{prefix}-{}", self.tag)).expect("invalid coupon code")
    }

    /// Create a coupon from `builder`, applied to a 10% no-limit template.
    ///
    /// # Panics
    ///
    /// Panics if the coupon rules are invalid or the insert fails.
    pub async fn coupon(&self, prefix: &str, builder: impl FnOnce(&mut NewCoupon)) -> Coupon {
        let mut new_coupon = NewCoupon {
            code: self.coupon_code(prefix),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::TEN,
            min_purchase_amount: None,
            max_discount_amount: None,
            usage_limit: None,
            expires_at: None,
        };
        builder(&mut new_coupon);
        new_coupon.validate().expect("invalid coupon rules");

        CouponRepository::new(&self.pool)
            .create(&new_coupon)
            .await
            .expect("Failed to create coupon")
    }

    /// Move a coupon's expiry, bypassing creation rules.
    ///
    /// # Panics
    ///
    /// Panics if the update fails.
    pub async fn set_coupon_expiry(&self, coupon: &Coupon, expires_at: DateTime<Utc>) {
        sqlx::query("UPDATE storefront.coupon SET expires_at = $2 WHERE id = $1")
            .bind(coupon.id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .expect("Failed to update coupon expiry");
    }

    /// Current usage count of a coupon.
    ///
    /// # Panics
    ///
    /// Panics if the coupon no longer exists.
    pub async fn used_count(&self, coupon: &Coupon) -> u32 {
        CouponRepository::new(&self.pool)
            .get_by_code(&coupon.code)
            .await
            .expect("Failed to load coupon")
            .expect("coupon missing")
            .used_count
    }
}

/// Shorthand for an amount in tests.
///
/// # Panics
///
/// Panics if `units` is negative.
#[must_use]
pub fn amount(units: i64) -> Amount {
    Amount::new(units).expect("amount must not be negative")
}
