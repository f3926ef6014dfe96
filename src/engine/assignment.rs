//! The three-entity assignment: courier, delivery record and order.
//!
//! Applied as a saga of compare-and-set writes: reserve the courier, then
//! claim the delivery record, then the order. A failed step undoes the steps
//! before it, so either all three agree on the courier or none changed. The
//! function never awaits, so no other task observes a half-applied saga
//! across a suspension point.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentSource, SearchMatch};
use crate::models::delivery::DeliveryRecord;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct Assigned {
    pub assignment: Assignment,
    pub delivery: DeliveryRecord,
}

pub fn assign_courier(
    state: &AppState,
    delivery_id: Uuid,
    courier_id: Uuid,
    source: AssignmentSource,
    search: Option<SearchMatch>,
) -> Result<Assigned, AppError> {
    let outcome = apply(state, delivery_id, courier_id);

    let (delivery, order_id) = match outcome {
        Ok(applied) => applied,
        Err(err) => {
            if matches!(err, AppError::Conflict(_)) {
                state.metrics.assignment_conflicts_total.inc();
            }
            warn!(
                delivery_id = %delivery_id,
                courier_id = %courier_id,
                source = source.as_str(),
                error = %err,
                "assignment rejected"
            );
            return Err(err);
        }
    };

    let assignment = Assignment {
        id: Uuid::new_v4(),
        order_id,
        delivery_id,
        courier_id,
        source,
        search,
        assigned_at: Utc::now(),
    };

    state.assignments.insert(assignment.id, assignment.clone());
    let _ = state.assignment_events_tx.send(assignment.clone());
    state
        .metrics
        .assignments_total
        .with_label_values(&[source.as_str()])
        .inc();

    info!(
        order_id = %order_id,
        delivery_id = %delivery_id,
        courier_id = %courier_id,
        source = source.as_str(),
        radius_m = search.map(|s| s.radius_m),
        distance_m = search.map(|s| s.distance_m),
        "courier assigned"
    );

    Ok(Assigned {
        assignment,
        delivery,
    })
}

fn apply(state: &AppState, delivery_id: Uuid, courier_id: Uuid) -> Result<(DeliveryRecord, Uuid), AppError> {
    state.users.reserve(courier_id)?;

    let delivery = match state.deliveries.assign_if_unassigned(delivery_id, courier_id) {
        Ok(delivery) => delivery,
        Err(err) => {
            state.users.release(courier_id);
            return Err(err);
        }
    };

    if let Err(err) = state.orders.assign_if_unassigned(delivery.order, courier_id) {
        state.deliveries.revert_assignment(delivery_id, courier_id);
        state.users.release(courier_id);
        return Err(err);
    }

    let order_id = delivery.order;
    Ok((delivery, order_id))
}
