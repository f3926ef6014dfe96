//! Verified payment events from the payment provider.
//!
//! Signature checks happen upstream; events reaching this module are trusted.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::DeliveryRecord;
use crate::models::order::Order;
use crate::state::AppState;
use crate::store::orders::PaymentTransition;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub order_id: Uuid,
    pub reference: String,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentApplied {
    pub order: Order,
    pub delivery: Option<DeliveryRecord>,
}

pub fn apply_payment_event(state: &AppState, event: &PaymentEvent) -> Result<PaymentApplied, AppError> {
    let reference = event.reference.trim();
    if reference.is_empty() {
        return Err(AppError::BadRequest("payment reference is required".to_string()));
    }

    match event.outcome {
        PaymentOutcome::Failed => {
            let order = state.orders.mark_failed(event.order_id, reference)?;
            info!(order_id = %order.id, reference, "payment failed");
            Ok(PaymentApplied {
                order,
                delivery: None,
            })
        }
        PaymentOutcome::Succeeded => {
            let order = match state.orders.mark_paid(event.order_id, reference)? {
                PaymentTransition::Applied(order) => {
                    info!(order_id = %order.id, reference, "payment confirmed");
                    order
                }
                PaymentTransition::Replayed(order) => {
                    info!(order_id = %order.id, reference, "payment confirmation replayed");
                    order
                }
            };

            let delivery = open_delivery(state, &order)?;
            Ok(PaymentApplied {
                order,
                delivery,
            })
        }
    }
}

/// Opens the delivery record for a freshly paid order. Replays land here
/// too and reuse the existing record; orders already past the paid pool get
/// none.
fn open_delivery(state: &AppState, order: &Order) -> Result<Option<DeliveryRecord>, AppError> {
    if !order.status.awaits_courier() {
        return Ok(None);
    }

    if order.assigned_delivery.is_some() {
        return Ok(state.deliveries.open_for_order(order.id));
    }

    let Some(vendor) = state.vendors.get(order.vendor) else {
        warn!(order_id = %order.id, vendor_id = %order.vendor, "paid order references unknown vendor");
        return Ok(None);
    };

    let (delivery, created) = state
        .deliveries
        .ensure_open(order.id, || DeliveryRecord::open_for(order, vendor.location))?;
    if created {
        info!(order_id = %order.id, delivery_id = %delivery.id, "delivery record created");
    }
    Ok(Some(delivery))
}
