//! Coupon repository.
//!
//! Lookups are case-insensitive on `code`. The usage counter is only ever
//! changed by [`redeem`], which increments it conditionally so that two
//! concurrent orders can never push `used_count` past `usage_limit`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};

use bazaar_core::{Amount, Coupon, CouponCode, CouponId, DiscountType, NewCoupon};

use super::{RepositoryError, conflict_on_unique};

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    discount_type: DiscountType,
    discount_value: Decimal,
    min_purchase_amount: Option<i64>,
    max_discount_amount: Option<i64>,
    usage_limit: Option<i32>,
    used_count: i32,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn stored_amount(value: Option<i64>, field: &str, id: CouponId) -> Result<Option<Amount>, RepositoryError> {
    value
        .map(Amount::new)
        .transpose()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {field} for coupon {id}: {e}")))
}

fn stored_count(value: i32, field: &str, id: CouponId) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {field} for coupon {id}")))
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let code = CouponCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid code for coupon {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            code,
            discount_type: row.discount_type,
            discount_value: row.discount_value,
            min_purchase_amount: stored_amount(row.min_purchase_amount, "min_purchase_amount", row.id)?,
            max_discount_amount: stored_amount(row.max_discount_amount, "max_discount_amount", row.id)?,
            usage_limit: row
                .usage_limit
                .map(|limit| stored_count(limit, "usage_limit", row.id))
                .transpose()?,
            used_count: stored_count(row.used_count, "used_count", row.id)?,
            is_active: row.is_active,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

const COUPON_COLUMNS: &str = r"
    id, code, discount_type, discount_value, min_purchase_amount,
    max_discount_amount, usage_limit, used_count, is_active, expires_at, created_at
";

/// Repository for coupon database operations.
#[derive(Clone, Copy)]
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a coupon by code, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!(
            "SELECT {COUPON_COLUMNS} FROM storefront.coupon WHERE UPPER(code) = UPPER($1)"
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(code.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// List every coupon, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let sql = format!(
            "SELECT {COUPON_COLUMNS} FROM storefront.coupon ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, CouponRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Coupon::try_from).collect()
    }

    /// Create a coupon. The caller is expected to have run
    /// [`NewCoupon::validate`] first; the table constraints catch the rest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, coupon: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let usage_limit = coupon
            .usage_limit
            .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX));

        let sql = format!(
            r"
            INSERT INTO storefront.coupon (
                code, discount_type, discount_value, min_purchase_amount,
                max_discount_amount, usage_limit, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COUPON_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(coupon.code.as_str())
            .bind(coupon.discount_type)
            .bind(coupon.discount_value)
            .bind(coupon.min_purchase_amount.map(Amount::units))
            .bind(coupon.max_discount_amount.map(Amount::units))
            .bind(usage_limit)
            .bind(coupon.expires_at)
            .fetch_one(self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "coupon code"))?;

        Coupon::try_from(row)
    }

    /// Activate or deactivate a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no coupon has this code.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_active(&self, code: &CouponCode, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.coupon
            SET is_active = $2, updated_at = NOW()
            WHERE UPPER(code) = UPPER($1)
            ",
        )
        .bind(code.as_str())
        .bind(is_active)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Redeem a coupon outside an order. See [`redeem`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn redeem(&self, id: CouponId) -> Result<bool, RepositoryError> {
        redeem(self.pool, id).await
    }
}

/// Atomically consume one use of a coupon.
///
/// The increment only applies while the coupon is still active, unexpired
/// and under its usage limit, all judged by the database at commit time.
/// Run it on the order's transaction so a failed order gives the use back.
///
/// # Returns
///
/// Returns `true` if a use was consumed, `false` if the coupon is no longer
/// redeemable (limit reached, deactivated, expired or deleted).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn redeem<'e>(executor: impl PgExecutor<'e>, id: CouponId) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.coupon
        SET used_count = used_count + 1, updated_at = NOW()
        WHERE id = $1
          AND is_active
          AND (usage_limit IS NULL OR used_count < usage_limit)
          AND (expires_at IS NULL OR expires_at > NOW())
        ",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}
