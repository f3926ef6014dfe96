use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::checkout::place_order;
use crate::engine::payments::{PaymentApplied, PaymentEvent, apply_payment_event};
use crate::error::AppError;
use crate::models::order::{Order, OrderItem};
use crate::models::user::{Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/payments/events", post(payment_event))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub vendor_id: Uuid,
    pub items: Vec<OrderItem>,
    pub drop_off_address: String,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Actor(customer): Actor,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = place_order(
        &state,
        &customer,
        payload.vendor_id,
        payload.items,
        &payload.drop_off_address,
    )
    .await?;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Actor(caller): Actor,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.require(id)?;

    if !can_view(&state, &caller, &order) {
        return Err(AppError::Forbidden(format!("order {id} is not visible to you")));
    }

    Ok(Json(order))
}

/// Customers see their own orders, vendors the orders placed with them and
/// couriers the orders they carry.
fn can_view(state: &AppState, caller: &User, order: &Order) -> bool {
    caller.role == Role::Admin
        || order.customer == caller.id
        || order.assigned_delivery == Some(caller.id)
        || state
            .vendors
            .get(order.vendor)
            .is_some_and(|vendor| vendor.owner == caller.id)
}

async fn payment_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<PaymentEvent>,
) -> Result<Json<PaymentApplied>, AppError> {
    Ok(Json(apply_payment_event(&state, &event)?))
}
