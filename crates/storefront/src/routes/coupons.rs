//! Coupon route handlers.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{Amount, CouponValidation};

use super::ApiJson;
use crate::db::CouponRepository;
use crate::error::Result;
use crate::services::CouponService;
use crate::state::AppState;

/// `POST /coupons/validate` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    /// Code as typed by the shopper. Missing is treated as blank.
    #[serde(default)]
    pub code: String,
    pub cart_total: Amount,
}

/// Check a coupon code against a cart total.
///
/// Business rejections (unknown code, expired, below minimum, ...) are a
/// `200` with `valid: false`. Nothing is consumed; the coupon is only
/// redeemed when an order is placed.
#[instrument(skip(state))]
pub async fn validate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ValidateCouponRequest>,
) -> Result<Json<CouponValidation>> {
    let coupons = CouponService::new(CouponRepository::new(state.pool()));
    let validation = coupons
        .validate(&body.code, body.cart_total, Utc::now())
        .await?;

    tracing::debug!(valid = validation.valid, "Coupon validated");

    Ok(Json(validation))
}
