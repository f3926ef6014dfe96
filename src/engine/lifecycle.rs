//! Courier-initiated delivery transitions.
//!
//! ```text
//! pending --(scheduler match | claim)--> in-transit --(delivered)--> delivered
//!                                        in-transit --(cancel)-----> canceled
//! ```
//!
//! A canceled record stays canceled; the order returns to the paid pool with
//! a fresh pending record so it can be claimed or matched again.

use tracing::{error, info};
use uuid::Uuid;

use crate::engine::assignment::assign_courier;
use crate::error::AppError;
use crate::models::assignment::AssignmentSource;
use crate::models::delivery::DeliveryRecord;
use crate::models::user::User;
use crate::notify::{deliver, templates};
use crate::state::AppState;

pub fn claim_delivery(state: &AppState, courier: &User, delivery_id: Uuid) -> Result<DeliveryRecord, AppError> {
    if !courier.is_courier() {
        return Err(AppError::Forbidden(
            "only couriers can claim deliveries".to_string(),
        ));
    }

    let delivery = state.deliveries.require(delivery_id)?;
    if delivery.assigned_delivery.is_some() {
        return Err(AppError::Conflict(format!(
            "delivery {delivery_id} has already been assigned"
        )));
    }

    let assigned = assign_courier(state, delivery_id, courier.id, AssignmentSource::Claim, None)?;
    Ok(assigned.delivery)
}

pub fn mark_delivered(state: &AppState, courier: &User, delivery_id: Uuid) -> Result<DeliveryRecord, AppError> {
    let delivery = state.deliveries.complete_if_assigned(delivery_id, courier.id)?;

    if let Err(err) = state.orders.complete_if_assigned(delivery.order, courier.id) {
        state.deliveries.revert_completion(delivery_id, courier.id);
        error!(
            delivery_id = %delivery_id,
            order_id = %delivery.order,
            error = %err,
            "order disagrees with delivery record; completion rolled back"
        );
        return Err(err);
    }

    state.users.release(courier.id);

    info!(delivery_id = %delivery_id, order_id = %delivery.order, courier_id = %courier.id, "delivery completed");
    Ok(delivery)
}

pub async fn cancel_delivery(
    state: &AppState,
    courier: &User,
    delivery_id: Uuid,
    reason: &str,
) -> Result<DeliveryRecord, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest(
            "please provide a reason for cancellation".to_string(),
        ));
    }

    let canceled = state
        .deliveries
        .cancel_if_assigned(delivery_id, courier.id, reason)?;

    let order = match state.orders.release_if_assigned(canceled.order, courier.id) {
        Ok(order) => order,
        Err(err) => {
            state.deliveries.revert_cancel(delivery_id, courier.id);
            error!(
                delivery_id = %delivery_id,
                order_id = %canceled.order,
                error = %err,
                "order disagrees with delivery record; cancellation rolled back"
            );
            return Err(err);
        }
    };

    state.users.release(courier.id);

    let pickup = state
        .vendors
        .get(order.vendor)
        .map(|vendor| vendor.location)
        .unwrap_or_else(|| canceled.pickup_location.clone());
    let reopened = state
        .deliveries
        .ensure_open(order.id, || DeliveryRecord::open_for(&order, pickup));
    match reopened {
        Ok((fresh, _)) => info!(
            delivery_id = %delivery_id,
            order_id = %order.id,
            reopened_as = %fresh.id,
            courier_id = %courier.id,
            "delivery canceled; order back in pool"
        ),
        Err(err) => error!(order_id = %order.id, error = %err, "failed to reopen delivery"),
    }

    let timeout = state.settings.gateway_timeout;
    if let Some(customer) = state.users.get(order.customer) {
        deliver(
            state.notifier.as_ref(),
            &state.metrics,
            templates::delivery_canceled_customer(&customer, reason),
            timeout,
        )
        .await;
    }
    deliver(
        state.notifier.as_ref(),
        &state.metrics,
        templates::delivery_canceled_ops(&state.settings.admin_email, &canceled, courier, reason),
        timeout,
    )
    .await;

    Ok(canceled)
}

pub fn available_deliveries(state: &AppState) -> Vec<DeliveryRecord> {
    state.deliveries.open_unassigned()
}

pub fn current_delivery(state: &AppState, courier: &User) -> Result<DeliveryRecord, AppError> {
    state
        .deliveries
        .current_for(courier.id)
        .ok_or_else(|| AppError::NotFound("you have no active deliveries".to_string()))
}

pub fn delivery_history(state: &AppState, courier: &User) -> Vec<DeliveryRecord> {
    state.deliveries.history_for(courier.id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::fixtures::{Harness, OPS_EMAIL};
    use crate::engine::scheduler::run_cycle;
    use crate::models::delivery::DeliveryStatus;
    use crate::models::location::{GeoPoint, Location};
    use crate::models::order::OrderStatus;
    use crate::models::user::CourierStatus;

    #[test]
    fn claim_assigns_all_three_entities() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let courier = h.courier_km_north(30.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);

        let claimed = claim_delivery(&h.state, &courier, delivery.id).unwrap();

        assert_eq!(claimed.assigned_delivery, Some(courier.id));
        assert_eq!(
            h.state.orders.get(order.id).unwrap().assigned_delivery,
            Some(courier.id)
        );
        assert_eq!(h.state.users.get(courier.id).unwrap().status, CourierStatus::Busy);
    }

    #[test]
    fn claiming_assigned_delivery_conflicts_and_changes_nothing() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let first = h.courier_km_north(1.0, CourierStatus::Available);
        let second = h.courier_km_north(2.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);
        claim_delivery(&h.state, &first, delivery.id).unwrap();

        let order_before = h.state.orders.get(order.id).unwrap();
        let delivery_before = h.state.deliveries.get(delivery.id).unwrap();

        let err = claim_delivery(&h.state, &second, delivery.id).unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        let order_after = h.state.orders.get(order.id).unwrap();
        let delivery_after = h.state.deliveries.get(delivery.id).unwrap();
        assert_eq!(order_after.assigned_delivery, order_before.assigned_delivery);
        assert_eq!(order_after.updated_at, order_before.updated_at);
        assert_eq!(delivery_after.assigned_delivery, delivery_before.assigned_delivery);
        assert_eq!(delivery_after.updated_at, delivery_before.updated_at);
        assert_eq!(h.state.users.get(second.id).unwrap().status, CourierStatus::Available);
    }

    #[test]
    fn non_courier_cannot_claim() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let (_, delivery) = h.paid_order(&customer, &vendor);

        let err = claim_delivery(&h.state, &customer, delivery.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_exactly_one_winner() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let (order, delivery) = h.paid_order(&customer, &vendor);
        let couriers: Vec<_> = (0..8)
            .map(|i| h.courier_km_north(f64::from(i), CourierStatus::Available))
            .collect();

        let handles: Vec<_> = couriers
            .iter()
            .cloned()
            .map(|courier| {
                let state = Arc::clone(&h.state);
                let delivery_id = delivery.id;
                tokio::spawn(async move { claim_delivery(&state, &courier, delivery_id) })
            })
            .collect();

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);

        let order = h.state.orders.get(order.id).unwrap();
        let delivery = h.state.deliveries.get(delivery.id).unwrap();
        assert!(order.assigned_delivery.is_some());
        assert_eq!(order.assigned_delivery, delivery.assigned_delivery);
        let busy = couriers
            .iter()
            .filter(|c| h.state.users.get(c.id).unwrap().status == CourierStatus::Busy)
            .count();
        assert_eq!(busy, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn claim_racing_scheduler_never_double_assigns() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        h.courier_km_north(1.0, CourierStatus::Available);
        let claimer = h.courier_km_north(2.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);

        let state = Arc::clone(&h.state);
        let claim = tokio::spawn({
            let claimer = claimer.clone();
            async move { claim_delivery(&state, &claimer, delivery.id) }
        });
        let state = Arc::clone(&h.state);
        let cycle = tokio::spawn(async move { run_cycle(&state).await });

        let _ = claim.await.unwrap();
        cycle.await.unwrap();

        let order = h.state.orders.get(order.id).unwrap();
        let delivery = h.state.deliveries.get(delivery.id).unwrap();
        assert!(order.assigned_delivery.is_some());
        assert_eq!(order.assigned_delivery, delivery.assigned_delivery);
        assert_eq!(h.state.assignments.len(), 1);
    }

    #[test]
    fn delivered_frees_courier_and_closes_order() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let courier = h.courier_km_north(1.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);
        claim_delivery(&h.state, &courier, delivery.id).unwrap();

        let done = mark_delivered(&h.state, &courier, delivery.id).unwrap();

        assert_eq!(done.status, DeliveryStatus::Delivered);
        assert_eq!(h.state.orders.get(order.id).unwrap().status, OrderStatus::Delivered);
        assert_eq!(h.state.users.get(courier.id).unwrap().status, CourierStatus::Available);
        assert_eq!(delivery_history(&h.state, &courier).len(), 1);
        assert!(current_delivery(&h.state, &courier).is_err());

        let again = mark_delivered(&h.state, &courier, delivery.id).unwrap_err();
        assert!(matches!(again, AppError::BadRequest(_)));
    }

    #[test]
    fn only_assigned_courier_may_mark_delivered() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let courier = h.courier_km_north(1.0, CourierStatus::Available);
        let stranger = h.courier_km_north(2.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);
        claim_delivery(&h.state, &courier, delivery.id).unwrap();

        let err = mark_delivered(&h.state, &stranger, delivery.id).unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(h.state.orders.get(order.id).unwrap().status, OrderStatus::InTransit);
    }

    #[tokio::test]
    async fn cancel_releases_courier_and_reopens_order() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let courier = h.courier_km_north(1.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);
        claim_delivery(&h.state, &courier, delivery.id).unwrap();

        let canceled = cancel_delivery(&h.state, &courier, delivery.id, "bike broke down")
            .await
            .unwrap();

        assert_eq!(canceled.status, DeliveryStatus::Canceled);
        assert_eq!(canceled.cancel_reason.as_deref(), Some("bike broke down"));
        assert!(canceled.assigned_delivery.is_none());

        let order_after = h.state.orders.get(order.id).unwrap();
        assert!(order_after.assigned_delivery.is_none());
        assert_eq!(order_after.status, OrderStatus::Paid);
        assert_eq!(h.state.users.get(courier.id).unwrap().status, CourierStatus::Available);

        let reopened = h.state.deliveries.open_for_order(order.id).unwrap();
        assert_ne!(reopened.id, delivery.id);
        assert_eq!(reopened.status, DeliveryStatus::Pending);
        assert_eq!(delivery_history(&h.state, &courier).len(), 1);

        assert_eq!(h.outbox.sent_to("ada@example.com").len(), 1);
        assert_eq!(h.outbox.sent_to(OPS_EMAIL).len(), 1);

        let report = run_cycle(&h.state).await;
        assert_eq!(report.assigned, 1);
        let reassigned = h.state.orders.get(order.id).unwrap();
        assert_eq!(reassigned.assigned_delivery, Some(courier.id));
        assert_eq!(
            h.state.deliveries.get(reopened.id).unwrap().assigned_delivery,
            Some(courier.id)
        );
    }

    #[tokio::test]
    async fn reopened_record_picks_up_at_current_vendor_address() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let courier = h.courier_km_north(1.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);
        claim_delivery(&h.state, &courier, delivery.id).unwrap();

        let moved = Location::resolved("2 New Market", "2 New Market, Lagos".to_string(), GeoPoint::new(6.451, 3.40));
        h.state.vendors.set_location(vendor.id, vendor.owner, moved.clone()).unwrap();

        cancel_delivery(&h.state, &courier, delivery.id, "shop moved").await.unwrap();

        let reopened = h.state.deliveries.open_for_order(order.id).unwrap();
        assert_eq!(reopened.pickup_location, moved);
        assert_eq!(
            h.state.deliveries.get(delivery.id).unwrap().pickup_location,
            vendor.location
        );
    }

    #[tokio::test]
    async fn cancel_requires_reason() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let courier = h.courier_km_north(1.0, CourierStatus::Available);
        let (_, delivery) = h.paid_order(&customer, &vendor);
        claim_delivery(&h.state, &courier, delivery.id).unwrap();

        let err = cancel_delivery(&h.state, &courier, delivery.id, "   ")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(
            h.state.deliveries.get(delivery.id).unwrap().status,
            DeliveryStatus::InTransit
        );
    }

    #[tokio::test]
    async fn delivered_record_cannot_be_canceled() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let courier = h.courier_km_north(1.0, CourierStatus::Available);
        let (_, delivery) = h.paid_order(&customer, &vendor);
        claim_delivery(&h.state, &courier, delivery.id).unwrap();
        mark_delivered(&h.state, &courier, delivery.id).unwrap();

        let err = cancel_delivery(&h.state, &courier, delivery.id, "changed my mind")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(h.outbox.sent().is_empty());
    }
}
