//! Cart route handlers.
//!
//! The cart lives in the database, one line per product and variant
//! combination. Responses that change the cart carry the new unit count so
//! the client can update its badge without a second request.

use axum::extract::State;
use serde::Serialize;
use tracing::instrument;

use athleon_core::CartItemId;
use athleon_core::variant::ResolvedSelection;

use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::models::{AddToCart, CartView, UpdateCartItem};
use crate::response::{ApiResponse, Path, Payload};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Unit count badge.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

/// Result of adding to the cart.
#[derive(Debug, Serialize)]
pub struct CartAdded {
    pub cart_item_id: CartItemId,
    pub count: u32,
}

/// Result of editing a line.
#[derive(Debug, Serialize)]
pub struct CartUpdated {
    pub cart_item_id: CartItemId,
    #[serde(flatten)]
    pub selection: ResolvedSelection,
    pub count: u32,
}

/// `GET /api/customer/keranjang`.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
) -> Result<ApiResponse<CartView>> {
    let cart = CartService::new(state.pool()).view(user.id).await?;
    Ok(ApiResponse::ok(cart))
}

/// `POST /api/customer/keranjang`.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Payload(input): Payload<AddToCart>,
) -> Result<ApiResponse<CartAdded>> {
    let carts = CartService::new(state.pool());
    let cart_item_id = carts.add(user.id, &input).await?;
    let count = carts.count(user.id).await?;
    Ok(ApiResponse::created(CartAdded {
        cart_item_id,
        count,
    })
    .message("Added to cart"))
}

/// `PUT /api/customer/keranjang/{id}`.
#[instrument(skip_all, fields(user_id = %user.id, cart_item_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<CartItemId>,
    Payload(input): Payload<UpdateCartItem>,
) -> Result<ApiResponse<CartUpdated>> {
    let carts = CartService::new(state.pool());
    let selection = carts.update(user.id, id, &input).await?;
    let count = carts.count(user.id).await?;
    Ok(ApiResponse::ok(CartUpdated {
        cart_item_id: id,
        selection,
        count,
    }))
}

/// `DELETE /api/customer/keranjang/{id}`.
#[instrument(skip_all, fields(user_id = %user.id, cart_item_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<CartItemId>,
) -> Result<ApiResponse<CartCount>> {
    let carts = CartService::new(state.pool());
    carts.remove(user.id, id).await?;
    let count = carts.count(user.id).await?;
    Ok(ApiResponse::ok(CartCount { count }).message("Removed from cart"))
}

/// `GET /api/customer/keranjang/count`.
pub async fn count(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
) -> Result<ApiResponse<CartCount>> {
    let count = CartService::new(state.pool()).count(user.id).await?;
    Ok(ApiResponse::ok(CartCount { count }))
}
