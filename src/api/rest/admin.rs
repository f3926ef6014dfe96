use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};

use crate::api::rest::auth::Actor;
use crate::engine::accounts::require_admin;
use crate::engine::scheduler::{CycleReport, run_cycle};
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments", get(list_assignments))
        .route("/admin/assignment-cycles", post(trigger_cycle))
}

async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Actor(admin): Actor,
) -> Result<Json<Vec<Assignment>>, AppError> {
    require_admin(&admin)?;

    let mut assignments: Vec<Assignment> = state
        .assignments
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    assignments.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));

    Ok(Json(assignments))
}

/// Runs a cycle now. Waits for a cycle already in progress to finish first.
async fn trigger_cycle(
    State(state): State<Arc<AppState>>,
    Actor(admin): Actor,
) -> Result<Json<CycleReport>, AppError> {
    require_admin(&admin)?;
    Ok(Json(run_cycle(&state).await))
}
