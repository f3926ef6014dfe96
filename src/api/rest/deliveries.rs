use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::delivery::DeliveryRecord;
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries/available", get(available))
        .route("/deliveries/current", get(current))
        .route("/deliveries/history", get(history))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/claim", post(claim))
        .route("/deliveries/:id/delivered", patch(delivered))
        .route("/deliveries/:id/cancel", patch(cancel))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

async fn available(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<DeliveryRecord>>, AppError> {
    actor.courier()?;
    Ok(Json(lifecycle::available_deliveries(&state)))
}

async fn current(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<DeliveryRecord>, AppError> {
    let courier = actor.courier()?;
    Ok(Json(lifecycle::current_delivery(&state, &courier)?))
}

async fn history(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<DeliveryRecord>>, AppError> {
    let courier = actor.courier()?;
    Ok(Json(lifecycle::delivery_history(&state, &courier)))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Actor(caller): Actor,
) -> Result<Json<DeliveryRecord>, AppError> {
    let delivery = state.deliveries.require(id)?;

    let visible = caller.role == Role::Admin
        || delivery.customer == caller.id
        || delivery.handled_by(caller.id)
        || (caller.is_courier() && delivery.is_open() && delivery.assigned_delivery.is_none());
    if !visible {
        return Err(AppError::Forbidden(format!("delivery {id} is not visible to you")));
    }

    Ok(Json(delivery))
}

async fn claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Actor(courier): Actor,
) -> Result<Json<DeliveryRecord>, AppError> {
    Ok(Json(lifecycle::claim_delivery(&state, &courier, id)?))
}

async fn delivered(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<DeliveryRecord>, AppError> {
    let courier = actor.courier()?;
    Ok(Json(lifecycle::mark_delivered(&state, &courier, id)?))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let courier = actor.courier()?;
    let delivery = lifecycle::cancel_delivery(&state, &courier, id, &payload.reason).await?;
    Ok(Json(delivery))
}
