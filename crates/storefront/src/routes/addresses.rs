//! Address book route handlers.
//!
//! Saving an address without a Biteship area id tries to look one up from the
//! postal code and district. A failed lookup does not block the save; the
//! address simply cannot be quoted until it is edited.

use axum::extract::State;
use tracing::{info, instrument};

use athleon_core::AddressId;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{Address, AddressInput};
use crate::response::{ApiResponse, Path, Payload};
use crate::state::AppState;

/// `GET /api/customer/alamat`.
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
) -> Result<ApiResponse<Vec<Address>>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(ApiResponse::ok(addresses))
}

/// `POST /api/customer/alamat`.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Payload(input): Payload<AddressInput>,
) -> Result<ApiResponse<Address>> {
    let input = prepare(&state, input).await?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    info!(address_id = %address.id, has_area = address.area_id.is_some(), "Address created");
    Ok(ApiResponse::created(address).message("Address saved"))
}

/// `PUT /api/customer/alamat/{id}`.
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<AddressId>,
    Payload(input): Payload<AddressInput>,
) -> Result<ApiResponse<Address>> {
    let input = prepare(&state, input).await?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &input)
        .await?;
    Ok(ApiResponse::ok(address).message("Address updated"))
}

/// `POST /api/customer/alamat/{id}/default`.
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn set_default(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<AddressId>,
) -> Result<ApiResponse<Address>> {
    let address = AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await?;
    Ok(ApiResponse::ok(address).message("Default address changed"))
}

/// `DELETE /api/customer/alamat/{id}`.
#[instrument(skip_all, fields(user_id = %user.id, address_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    Path(id): Path<AddressId>,
) -> Result<ApiResponse<()>> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(ApiResponse::done("Address deleted"))
}

/// Validate the input and fill in a missing area id.
async fn prepare(state: &AppState, input: AddressInput) -> Result<AddressInput> {
    let mut input = input.normalize().map_err(AppError::Validation)?;
    if input.area_id.is_none() {
        input.area_id = state
            .biteship()
            .find_area_id(&input.postal_code, &input.district)
            .await;
    }
    Ok(input)
}
