use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::accounts;
use crate::error::AppError;
use crate::models::user::{CourierStatus, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", get(list_couriers))
        .route("/couriers/apply", post(apply_as_courier))
        .route("/couriers/me/status", patch(toggle_my_status))
        .route("/couriers/:id/status", patch(update_courier_status))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CourierStatus,
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    Actor(admin): Actor,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(accounts::list_couriers(&state, &admin)?))
}

async fn apply_as_courier(
    State(state): State<Arc<AppState>>,
    Actor(user): Actor,
) -> Result<Json<User>, AppError> {
    Ok(Json(accounts::apply_as_courier(&state, &user)?))
}

async fn toggle_my_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<User>, AppError> {
    let courier = actor.courier()?;
    Ok(Json(accounts::toggle_status(&state, &courier)?))
}

async fn update_courier_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Actor(admin): Actor,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<User>, AppError> {
    let courier = accounts::set_courier_status(&state, &admin, id, payload.status)?;
    Ok(Json(courier))
}
