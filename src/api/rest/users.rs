use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{patch, post};
use serde::Deserialize;

use crate::api::rest::auth::Actor;
use crate::engine::accounts::{self, NewUser};
use crate::error::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/me/address", patch(update_my_address))
}

#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateAddressRequest {
    pub address: String,
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<User>, AppError> {
    let user = accounts::register_user(
        &state,
        NewUser {
            name: payload.name,
            email: payload.email,
            role: Role::User,
            address: payload.address,
        },
    )
    .await?;

    Ok(Json(user))
}

async fn update_my_address(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
    Json(payload): Json<UpdateAddressRequest>,
) -> Result<Json<User>, AppError> {
    let user = accounts::update_address(&state, &user, &payload.address).await?;
    Ok(Json(user))
}
