//! HTTP route handlers for storefront.
//!
//! All bodies are JSON with camelCase field names.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Cart (guest cart in session, account cart when logged in)
//! GET  /cart                   - Priced cart
//! POST /cart/add               - Add units of a product
//! POST /cart/update            - Set a line's quantity (0 removes)
//! POST /cart/remove            - Remove a line
//! POST /cart/clear             - Empty the cart
//! POST /cart/merge             - Merge guest lines into the account cart (requires auth)
//!
//! # Coupons
//! POST /coupons/validate       - Check a code against a cart total (read-only)
//!
//! # Orders (requires auth)
//! POST /orders                 - Place an order from the account cart
//! GET  /orders                 - Order history, newest first
//! GET  /orders/{id}            - Order detail
//! ```

pub mod cart;
pub mod coupons;
pub mod health;
pub mod orders;

use axum::{
    Router,
    extract::FromRequest,
    routing::{get, post},
};
use sentry_tower::{NewSentryLayer, SentryHttpLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::error::AppError;
use crate::middleware::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::state::AppState;

/// JSON request body whose rejections become [`AppError::BadRequest`], so
/// malformed input gets the same `{"error": ...}` body as everything else.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/merge", post(cart::merge))
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new().route("/validate", post(coupons::validate))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
}

/// Create all application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/cart", cart_routes())
        .nest("/coupons", coupon_routes())
        .nest("/orders", order_routes())
}

/// Build the full application: routes, session, tracing and Sentry layers.
pub fn app<Store>(state: AppState, session_layer: SessionManagerLayer<Store>) -> Router
where
    Store: SessionStore + Clone,
{
    routes()
        .layer(session_layer)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        // Sentry layers (outermost for full request coverage)
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(NewSentryLayer::new_from_top())
}
