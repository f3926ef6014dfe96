//! Periodic courier assignment.
//!
//! Each tick runs one assignment cycle over every paid order that has no
//! courier. Orders are processed one after another; the cycle lock keeps a
//! manually triggered cycle from overlapping the periodic one. Cycles keep no
//! state between runs: everything is re-read from the stores.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::engine::assignment::assign_courier;
use crate::engine::search::find_courier;
use crate::error::AppError;
use crate::models::assignment::AssignmentSource;
use crate::models::delivery::DeliveryRecord;
use crate::models::order::Order;
use crate::models::vendor::Vendor;
use crate::notify::{deliver, templates};
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub candidates: usize,
    pub assigned: usize,
    pub unmatched: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OrderOutcome {
    Assigned,
    Unmatched,
    Skipped,
}

pub async fn run_assignment_scheduler(state: Arc<AppState>, every: Duration) {
    info!(interval = ?every, radii_m = ?state.settings.search_radii_m, "assignment scheduler started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        run_cycle(&state).await;
    }
}

/// One full pass over the current candidates. Failures are contained per
/// order; the cycle always visits every candidate.
pub async fn run_cycle(state: &AppState) -> CycleReport {
    let _cycle = state.cycle_lock.lock().await;
    let start = Instant::now();

    let candidates = state.orders.assignment_candidates();
    state
        .metrics
        .available_couriers
        .set(state.users.available_couriers() as i64);

    let mut report = CycleReport {
        candidates: candidates.len(),
        ..CycleReport::default()
    };

    for order in candidates {
        match process_order(state, &order).await {
            Ok(OrderOutcome::Assigned) => report.assigned += 1,
            Ok(OrderOutcome::Unmatched) => report.unmatched += 1,
            Ok(OrderOutcome::Skipped) => report.skipped += 1,
            Err(err) => {
                report.failed += 1;
                error!(order_id = %order.id, error = %err, "failed to process order");
            }
        }
    }

    state.metrics.assignment_cycles_total.inc();
    state
        .metrics
        .assignment_cycle_duration_seconds
        .observe(start.elapsed().as_secs_f64());

    if report.candidates > 0 {
        info!(
            candidates = report.candidates,
            assigned = report.assigned,
            unmatched = report.unmatched,
            skipped = report.skipped,
            failed = report.failed,
            "assignment cycle finished"
        );
    } else {
        debug!("assignment cycle found no unassigned orders");
    }

    report
}

async fn process_order(state: &AppState, order: &Order) -> Result<OrderOutcome, AppError> {
    let Some(vendor) = state.vendors.get(order.vendor) else {
        warn!(order_id = %order.id, vendor_id = %order.vendor, "vendor missing; skipping order");
        return Ok(OrderOutcome::Skipped);
    };

    let Some(pickup) = vendor.location.point else {
        debug!(order_id = %order.id, vendor_id = %vendor.id, "vendor has no resolved point; skipping order");
        return Ok(OrderOutcome::Skipped);
    };

    let Some(found) = find_courier(&state.users, &pickup, &state.settings.search_radii_m) else {
        state.metrics.unassigned_orders_total.inc();
        warn!(order_id = %order.id, "no courier within any search radius");
        notify_unassigned(state, order, &vendor).await;
        return Ok(OrderOutcome::Unmatched);
    };

    let (delivery, created) = state
        .deliveries
        .ensure_open(order.id, || DeliveryRecord::open_for(order, vendor.location.clone()))?;
    if created {
        info!(order_id = %order.id, delivery_id = %delivery.id, "opened delivery record for order");
    } else if state.deliveries.refresh_pickup(delivery.id, &vendor.location).is_some() {
        info!(order_id = %order.id, delivery_id = %delivery.id, "pickup refreshed from vendor address");
    }

    let assigned = match assign_courier(
        state,
        delivery.id,
        found.courier.id,
        AssignmentSource::Scheduler,
        Some(found.search),
    ) {
        Ok(assigned) => assigned,
        Err(AppError::Conflict(reason)) => {
            warn!(order_id = %order.id, %reason, "lost assignment race; retrying next cycle");
            return Ok(OrderOutcome::Skipped);
        }
        Err(err) => return Err(err),
    };

    deliver(
        state.notifier.as_ref(),
        &state.metrics,
        templates::order_allocated(&found.courier, &assigned.delivery),
        state.settings.gateway_timeout,
    )
    .await;

    Ok(OrderOutcome::Assigned)
}

async fn notify_unassigned(state: &AppState, order: &Order, vendor: &Vendor) {
    let timeout = state.settings.gateway_timeout;

    deliver(
        state.notifier.as_ref(),
        &state.metrics,
        templates::unassigned_order_alert(&state.settings.admin_email, order, vendor),
        timeout,
    )
    .await;

    if let Some(customer) = state.users.get(order.customer) {
        deliver(
            state.notifier.as_ref(),
            &state.metrics,
            templates::order_delayed(&customer, order),
            timeout,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::{CycleReport, run_cycle};
    use crate::engine::fixtures::{Harness, OPS_EMAIL, vendor_point};
    use crate::models::location::Location;
    use crate::models::delivery::DeliveryStatus;
    use crate::models::order::OrderStatus;
    use crate::models::user::CourierStatus;

    #[tokio::test]
    async fn assigns_nearest_available_courier() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        h.courier_km_north(3.0, CourierStatus::Busy);
        let mid = h.courier_km_north(8.0, CourierStatus::Available);
        h.courier_km_north(40.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);

        let report = run_cycle(&h.state).await;

        assert_eq!(report.assigned, 1);
        let order = h.state.orders.get(order.id).unwrap();
        let delivery = h.state.deliveries.get(delivery.id).unwrap();
        assert_eq!(order.assigned_delivery, Some(mid.id));
        assert_eq!(order.status, OrderStatus::InTransit);
        assert_eq!(delivery.assigned_delivery, Some(mid.id));
        assert_eq!(delivery.status, DeliveryStatus::InTransit);
        assert_eq!(h.state.users.get(mid.id).unwrap().status, CourierStatus::Busy);

        let allocation = h.outbox.sent_to(&mid.email);
        assert_eq!(allocation.len(), 1);
        assert_eq!(allocation[0].subject, "Order Allocation");

        let logged: Vec<_> = h.state.assignments.iter().map(|e| e.value().clone()).collect();
        assert_eq!(logged[0].search.unwrap().radius_m, 15_000);
    }

    #[tokio::test]
    async fn no_courier_notifies_ops_and_customer_once_each() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        h.courier_km_north(80.0, CourierStatus::Available);
        let (order, _) = h.paid_order(&customer, &vendor);

        let report = run_cycle(&h.state).await;

        assert_eq!(report.unmatched, 1);
        assert_eq!(h.outbox.sent().len(), 2);
        assert_eq!(h.outbox.sent_to(OPS_EMAIL).len(), 1);
        assert_eq!(h.outbox.sent_to("ada@example.com").len(), 1);

        let after = h.state.orders.get(order.id).unwrap();
        assert_eq!(after.status, OrderStatus::Paid);
        assert!(after.assigned_delivery.is_none());
        assert_eq!(h.state.orders.assignment_candidates().len(), 1);
    }

    #[tokio::test]
    async fn vendor_without_point_is_skipped_silently() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_without_point();
        h.courier_km_north(1.0, CourierStatus::Available);
        h.paid_order(&customer, &vendor);

        let report = run_cycle(&h.state).await;

        assert_eq!(report.skipped, 1);
        assert!(h.outbox.sent().is_empty());
        assert!(h.state.assignments.is_empty());
    }

    #[tokio::test]
    async fn notification_failure_keeps_assignment() {
        let h = Harness::new();
        h.outbox.set_failing(true);
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        let courier = h.courier_km_north(1.0, CourierStatus::Available);
        let (order, _) = h.paid_order(&customer, &vendor);

        let report = run_cycle(&h.state).await;

        assert_eq!(report.assigned, 1);
        assert_eq!(
            h.state.orders.get(order.id).unwrap().assigned_delivery,
            Some(courier.id)
        );
    }

    #[tokio::test]
    async fn one_bad_order_does_not_stop_the_cycle() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let mapped = h.vendor_with_point();
        let unmapped = h.vendor_without_point();
        h.courier_km_north(1.0, CourierStatus::Available);
        h.paid_order(&customer, &unmapped);
        let (good, _) = h.paid_order(&customer, &mapped);

        let report = run_cycle(&h.state).await;

        assert_eq!(report.candidates, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.assigned, 1);
        assert!(h.state.orders.get(good.id).unwrap().assigned_delivery.is_some());
    }

    #[tokio::test]
    async fn allocation_mail_uses_vendor_address_fixed_after_payment() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_without_point();
        let courier = h.courier_km_north(1.0, CourierStatus::Available);
        let (_, delivery) = h.paid_order(&customer, &vendor);

        let fixed = Location::resolved("1 Kitchen Lane", "1 Kitchen Lane, Lagos".to_string(), vendor_point());
        h.state.vendors.set_location(vendor.id, vendor.owner, fixed.clone()).unwrap();

        let report = run_cycle(&h.state).await;

        assert_eq!(report.assigned, 1);
        assert_eq!(h.state.deliveries.get(delivery.id).unwrap().pickup_location, fixed);
        let allocation = h.outbox.sent_to(&courier.email);
        assert!(allocation[0].html.contains("1 Kitchen Lane"));
    }

    #[tokio::test]
    async fn second_cycle_without_changes_writes_nothing() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        h.courier_km_north(2.0, CourierStatus::Available);
        let (order, delivery) = h.paid_order(&customer, &vendor);

        run_cycle(&h.state).await;
        let order_before = h.state.orders.get(order.id).unwrap();
        let delivery_before = h.state.deliveries.get(delivery.id).unwrap();
        let sent_before = h.outbox.sent().len();

        let report = run_cycle(&h.state).await;

        assert_eq!(report, CycleReport::default());
        assert_eq!(h.state.orders.get(order.id).unwrap().updated_at, order_before.updated_at);
        assert_eq!(
            h.state.deliveries.get(delivery.id).unwrap().updated_at,
            delivery_before.updated_at
        );
        assert_eq!(h.outbox.sent().len(), sent_before);
        assert_eq!(h.state.assignments.len(), 1);
    }

    #[tokio::test]
    async fn more_orders_than_couriers_leaves_rest_for_next_cycle() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();
        h.courier_km_north(2.0, CourierStatus::Available);
        h.paid_order(&customer, &vendor);
        h.paid_order(&customer, &vendor);

        let report = run_cycle(&h.state).await;

        assert_eq!(report.assigned, 1);
        assert_eq!(report.unmatched, 1);
        assert_eq!(h.state.orders.assignment_candidates().len(), 1);
    }
}
