use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::vendors::{self, NewVendor};
use crate::error::AppError;
use crate::models::vendor::Vendor;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vendors", post(register_vendor))
        .route("/vendors/:id", get(get_vendor))
        .route("/vendors/:id/address", patch(update_vendor_address))
}

#[derive(Deserialize)]
pub struct RegisterVendorRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Deserialize)]
pub struct UpdateAddressRequest {
    pub address: String,
}

async fn register_vendor(
    State(state): State<Arc<AppState>>,
    Actor(owner): Actor,
    Json(payload): Json<RegisterVendorRequest>,
) -> Result<Json<Vendor>, AppError> {
    let vendor = vendors::register_vendor(
        &state,
        &owner,
        NewVendor {
            name: payload.name,
            email: payload.email,
            phone: payload.phone,
            address: payload.address,
        },
    )
    .await?;

    Ok(Json(vendor))
}

async fn get_vendor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vendor>, AppError> {
    Ok(Json(state.vendors.require(id)?))
}

async fn update_vendor_address(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Actor(owner): Actor,
    Json(payload): Json<UpdateAddressRequest>,
) -> Result<Json<Vendor>, AppError> {
    let vendor = vendors::update_vendor_address(&state, &owner, id, &payload.address).await?;
    Ok(Json(vendor))
}
