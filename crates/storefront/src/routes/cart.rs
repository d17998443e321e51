//! Cart route handlers.
//!
//! Guests' carts live in the session; once logged in, the account cart in
//! `PostgreSQL` is used instead. Every mutation responds with the priced cart.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{CartLine, ProductId, Quantity};

use super::ApiJson;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{MergeResponse, PricedCart};
use crate::services::{ActiveCart, CartError, CartService, SessionCartStore};
use crate::state::AppState;

/// `POST /cart/add` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    /// Defaults to 1.
    pub quantity: Option<u32>,
}

/// `POST /cart/update` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// `POST /cart/remove` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
}

/// Show the priced cart.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<PricedCart>> {
    let store = ActiveCart::select(state.pool(), session, user.as_ref());
    let cart = CartService::new(state.pool()).view(&store).await?;
    Ok(Json(cart))
}

/// Add units of a product.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    ApiJson(body): ApiJson<AddToCartRequest>,
) -> Result<Json<PricedCart>> {
    let quantity = Quantity::new(body.quantity.unwrap_or(1)).map_err(CartError::from)?;
    let store = ActiveCart::select(state.pool(), session, user.as_ref());

    let cart = CartService::new(state.pool())
        .add(&store, body.product_id, quantity)
        .await?;

    let product_id = body.product_id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product_id.as_str())]));

    Ok(Json(cart))
}

/// Set a line's quantity. Zero removes the line.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    ApiJson(body): ApiJson<UpdateCartRequest>,
) -> Result<Json<PricedCart>> {
    let store = ActiveCart::select(state.pool(), session, user.as_ref());
    let cart = CartService::new(state.pool())
        .update(&store, body.product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// Remove a line.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    ApiJson(body): ApiJson<RemoveFromCartRequest>,
) -> Result<Json<PricedCart>> {
    let store = ActiveCart::select(state.pool(), session, user.as_ref());
    let cart = CartService::new(state.pool())
        .remove(&store, body.product_id)
        .await?;
    Ok(Json(cart))
}

/// Empty the cart.
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<PricedCart>> {
    let store = ActiveCart::select(state.pool(), session, user.as_ref());
    let cart = CartService::new(state.pool()).clear(&store).await?;
    Ok(Json(cart))
}

/// Merge guest cart lines into the logged-in user's account cart.
///
/// The client sends its guest lines right after login. Any guest cart
/// held in this session is merged along with them, so an empty array
/// merges just the session cart.
#[instrument(skip(state, session, user, lines), fields(user_id = %user.id))]
pub async fn merge(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    ApiJson(lines): ApiJson<Vec<CartLine>>,
) -> Result<Json<MergeResponse>> {
    let guest = SessionCartStore::new(session);
    let merged = CartService::new(state.pool())
        .merge(user.id, &guest, lines)
        .await?;
    Ok(Json(merged))
}
