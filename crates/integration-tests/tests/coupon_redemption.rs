//! Integration tests for coupon validation, redemption and checkout.
//!
//! These tests require a running `PostgreSQL` database and
//! `TEST_DATABASE_URL` pointing at it.
//!
//! Run with: cargo test -p bazaar-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use bazaar_core::{DiscountType, Quantity, Rejection};
use bazaar_integration_tests::{TestContext, amount};
use bazaar_storefront::db::{CartRepository, CouponRepository, OrderRepository};
use bazaar_storefront::services::{CheckoutError, CheckoutService, CouponService};

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_validate_never_consumes_usage() {
    let ctx = TestContext::new().await;
    let coupon = ctx.coupon("ONCE", |c| c.usage_limit = Some(1)).await;
    let coupons = CouponService::new(CouponRepository::new(&ctx.pool));

    for _ in 0..3 {
        let validation = coupons
            .validate(coupon.code.as_str(), amount(30_000), Utc::now())
            .await
            .unwrap();
        assert!(validation.valid);
        assert_eq!(validation.discount_amount, amount(3_000));
        assert_eq!(validation.final_total, amount(27_000));
    }

    assert_eq!(ctx.used_count(&coupon).await, 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_validate_matches_code_case_insensitively() {
    let ctx = TestContext::new().await;
    let coupon = ctx.coupon("CASE", |_| {}).await;
    let coupons = CouponService::new(CouponRepository::new(&ctx.pool));

    let typed = format!("  {}  ", coupon.code.as_str().to_lowercase());
    let validation = coupons
        .validate(&typed, amount(10_000), Utc::now())
        .await
        .unwrap();

    assert!(validation.valid);
    assert_eq!(validation.coupon_id, Some(coupon.id));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_validate_reports_rejections() {
    let ctx = TestContext::new().await;
    let coupons = CouponService::new(CouponRepository::new(&ctx.pool));

    let min = ctx
        .coupon("MIN", |c| c.min_purchase_amount = Some(amount(50_000)))
        .await;
    let check = coupons
        .check(min.code.as_str(), amount(49_999), Utc::now())
        .await
        .unwrap();
    assert_eq!(
        check.unwrap_err(),
        Rejection::BelowMinimum {
            minimum: amount(50_000)
        }
    );

    let expired = ctx.coupon("OLD", |_| {}).await;
    ctx.set_coupon_expiry(&expired, Utc::now() - Duration::hours(1))
        .await;
    let check = coupons
        .check(expired.code.as_str(), amount(10_000), Utc::now())
        .await
        .unwrap();
    assert_eq!(check.unwrap_err(), Rejection::Expired);

    let unknown = ctx.coupon_code("NOBODY");
    let check = coupons
        .check(unknown.as_str(), amount(10_000), Utc::now())
        .await
        .unwrap();
    assert_eq!(check.unwrap_err(), Rejection::NotFound);
}

// ============================================================================
// Redemption
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_concurrent_redeem_at_last_use_succeeds_once() {
    let ctx = TestContext::new().await;
    let coupon = ctx.coupon("LAST", |c| c.usage_limit = Some(1)).await;

    let first = CouponRepository::new(&ctx.pool);
    let second = CouponRepository::new(&ctx.pool);
    let (a, b) = tokio::join!(first.redeem(coupon.id), second.redeem(coupon.id));

    let successes = [a.unwrap(), b.unwrap()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    assert_eq!(ctx.used_count(&coupon).await, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_redeem_refuses_inactive_and_expired() {
    let ctx = TestContext::new().await;
    let coupons = CouponRepository::new(&ctx.pool);

    let inactive = ctx.coupon("OFF", |_| {}).await;
    coupons.set_active(&inactive.code, false).await.unwrap();
    assert!(!coupons.redeem(inactive.id).await.unwrap());

    let expired = ctx.coupon("GONE", |_| {}).await;
    ctx.set_coupon_expiry(&expired, Utc::now() - Duration::seconds(1))
        .await;
    assert!(!coupons.redeem(expired.id).await.unwrap());

    assert_eq!(ctx.used_count(&inactive).await, 0);
    assert_eq!(ctx.used_count(&expired).await, 0);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_place_order_with_coupon() {
    let ctx = TestContext::new().await;
    let user = ctx.user();
    let mug = ctx.product("Mug", 12_000, true).await;
    let coupon = ctx
        .coupon("SAVE", |c| {
            c.discount_type = DiscountType::Fixed;
            c.discount_value = Decimal::new(5_000, 0);
        })
        .await;

    let carts = CartRepository::new(&ctx.pool);
    carts.add(user.id, mug.id, Quantity::new(2).unwrap()).await.unwrap();

    let order = CheckoutService::new(&ctx.pool)
        .place_order(&user, Some(&coupon.code.as_str().to_lowercase()))
        .await
        .unwrap();

    assert_eq!(order.subtotal, amount(24_000));
    assert_eq!(order.discount_amount, amount(5_000));
    assert_eq!(order.total, amount(19_000));
    assert_eq!(order.coupon_code.as_deref(), Some(coupon.code.as_str()));
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].unit_price, amount(12_000));
    assert_eq!(order.lines[0].line_total, amount(24_000));

    assert!(carts.get(user.id).await.unwrap().is_empty());
    assert_eq!(ctx.used_count(&coupon).await, 1);

    let orders = OrderRepository::new(&ctx.pool);
    assert_eq!(orders.get(user.id, order.id).await.unwrap(), Some(order.clone()));
    assert_eq!(orders.list(user.id).await.unwrap(), vec![order.clone()]);

    // Another user's orders are not visible
    assert_eq!(orders.get(ctx.user().id, order.id).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_place_order_with_used_up_coupon_keeps_cart() {
    let ctx = TestContext::new().await;
    let first = ctx.user();
    let second = ctx.user();
    let mug = ctx.product("Mug", 12_000, true).await;
    let coupon = ctx.coupon("SOLO", |c| c.usage_limit = Some(1)).await;

    let carts = CartRepository::new(&ctx.pool);
    carts.add(first.id, mug.id, Quantity::ONE).await.unwrap();
    carts.add(second.id, mug.id, Quantity::ONE).await.unwrap();

    let checkout = CheckoutService::new(&ctx.pool);
    checkout
        .place_order(&first, Some(coupon.code.as_str()))
        .await
        .unwrap();

    let err = checkout
        .place_order(&second, Some(coupon.code.as_str()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::CouponRejected(Rejection::UsageLimitReached)
    ));

    // Nothing was consumed for the rejected order
    assert_eq!(carts.get(second.id).await.unwrap().item_count(), 1);
    assert_eq!(ctx.used_count(&coupon).await, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_concurrent_checkouts_share_last_coupon_use() {
    let ctx = TestContext::new().await;
    let first = ctx.user();
    let second = ctx.user();
    let mug = ctx.product("Mug", 12_000, true).await;
    let coupon = ctx.coupon("RACE", |c| c.usage_limit = Some(1)).await;

    let carts = CartRepository::new(&ctx.pool);
    carts.add(first.id, mug.id, Quantity::ONE).await.unwrap();
    carts.add(second.id, mug.id, Quantity::ONE).await.unwrap();

    let checkout = CheckoutService::new(&ctx.pool);
    let code = coupon.code.as_str();
    let (a, b) = tokio::join!(
        checkout.place_order(&first, Some(code)),
        checkout.place_order(&second, Some(code))
    );

    let results = [a, b];
    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 1);

    // The loser either saw the limit at validation or lost at redemption
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(
        loser,
        CheckoutError::CouponUnavailable
            | CheckoutError::CouponRejected(Rejection::UsageLimitReached)
    ));
    assert_eq!(ctx.used_count(&coupon).await, 1);

    let remaining =
        carts.get(first.id).await.unwrap().item_count() + carts.get(second.id).await.unwrap().item_count();
    assert_eq!(remaining, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_place_order_refuses_empty_cart_and_unavailable_products() {
    let ctx = TestContext::new().await;
    let user = ctx.user();
    let checkout = CheckoutService::new(&ctx.pool);

    let err = checkout.place_order(&user, None).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    let mug = ctx.product("Mug", 12_000, true).await;
    CartRepository::new(&ctx.pool)
        .add(user.id, mug.id, Quantity::ONE)
        .await
        .unwrap();

    // Discontinue after it was carted
    sqlx::query("UPDATE storefront.product SET is_active = FALSE WHERE id = $1")
        .bind(mug.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let err = checkout.place_order(&user, None).await.unwrap_err();
    match err {
        CheckoutError::UnavailableProducts(ids) => assert_eq!(ids, vec![mug.id]),
        other => panic!("expected UnavailableProducts, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_place_order_without_coupon_ignores_blank_code() {
    let ctx = TestContext::new().await;
    let user = ctx.user();
    let mug = ctx.product("Mug", 12_000, true).await;
    CartRepository::new(&ctx.pool)
        .add(user.id, mug.id, Quantity::new(3).unwrap())
        .await
        .unwrap();

    let order = CheckoutService::new(&ctx.pool)
        .place_order(&user, Some("   "))
        .await
        .unwrap();

    assert_eq!(order.total, amount(36_000));
    assert_eq!(order.discount_amount, amount(0));
    assert_eq!(order.coupon_code, None);
}
