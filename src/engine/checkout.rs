use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::geocoder::{Requirement, resolve_location};
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::models::user::User;
use crate::state::AppState;

/// Tax rate in percent of the subtotal.
pub const TAX_PERCENT: i64 = 10;
/// Flat shipping fee in minor units.
pub const SHIPPING_FEE: i64 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: i64,
    pub tax: i64,
    pub shipping_fee: i64,
    pub total: i64,
}

pub fn compute_totals(items: &[OrderItem]) -> Result<Totals, AppError> {
    let overflow = || AppError::BadRequest("order total overflows".to_string());

    let subtotal = items
        .iter()
        .try_fold(0i64, |acc, item| {
            item.unit_price
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| acc.checked_add(line))
        })
        .ok_or_else(overflow)?;

    // Rounded half up to the nearest minor unit.
    let tax = subtotal
        .checked_mul(TAX_PERCENT)
        .and_then(|scaled| scaled.checked_add(50))
        .map(|scaled| scaled / 100)
        .ok_or_else(overflow)?;

    let total = subtotal
        .checked_add(tax)
        .and_then(|sum| sum.checked_add(SHIPPING_FEE))
        .ok_or_else(overflow)?;

    Ok(Totals {
        subtotal,
        tax,
        shipping_fee: SHIPPING_FEE,
        total,
    })
}

/// Creates a pending order. The drop-off address must geocode; otherwise
/// nothing is saved.
pub async fn place_order(
    state: &AppState,
    customer: &User,
    vendor_id: Uuid,
    items: Vec<OrderItem>,
    drop_off_address: &str,
) -> Result<Order, AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest(
            "order must contain at least one item".to_string(),
        ));
    }
    if let Some(item) = items.iter().find(|item| item.quantity == 0 || item.unit_price < 0) {
        return Err(AppError::BadRequest(format!(
            "invalid quantity or price for item {}",
            item.name
        )));
    }

    state.vendors.require(vendor_id)?;
    let totals = compute_totals(&items)?;

    let drop_off_location = resolve_location(
        state.geocoder.as_ref(),
        drop_off_address,
        Requirement::Mandatory,
        state.settings.gateway_timeout,
    )
    .await?;

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        customer: customer.id,
        vendor: vendor_id,
        items,
        subtotal: totals.subtotal,
        tax: totals.tax,
        shipping_fee: totals.shipping_fee,
        total: totals.total,
        reference: None,
        status: OrderStatus::Pending,
        assigned_delivery: None,
        drop_off_location,
        created_at: now,
        updated_at: now,
    };

    state.orders.insert(order.clone());
    info!(order_id = %order.id, customer_id = %customer.id, total = order.total, "order placed");
    Ok(order)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::engine::fixtures::Harness;

    fn item(unit_price: i64, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            name: "Amala".to_string(),
            unit_price,
            quantity,
        }
    }

    #[test]
    fn totals_add_tax_and_shipping() {
        let totals = compute_totals(&[item(100_000, 2), item(50_000, 1)]).unwrap();

        assert_eq!(totals.subtotal, 250_000);
        assert_eq!(totals.tax, 25_000);
        assert_eq!(totals.shipping_fee, SHIPPING_FEE);
        assert_eq!(totals.total, 325_000);
    }

    #[test]
    fn oversized_price_is_rejected_instead_of_wrapping() {
        let err = compute_totals(&[item(i64::MAX / 5, 1)]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = compute_totals(&[item(i64::MAX - 10, 1)]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn largest_price_that_fits_still_totals() {
        let price = (i64::MAX - SHIPPING_FEE) / 11;
        let totals = compute_totals(&[item(price, 1)]).unwrap();
        assert_eq!(totals.total, totals.subtotal + totals.tax + SHIPPING_FEE);
    }

    #[tokio::test]
    async fn unresolvable_drop_off_saves_nothing() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();

        let err = place_order(&h.state, &customer, vendor.id, vec![item(1_000, 1)], "the moon")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(h.state.orders.is_empty());
    }

    #[tokio::test]
    async fn placed_order_is_pending_and_not_a_candidate() {
        let h = Harness::new();
        h.geocoder.insert("7 Home Street", 6.46, 3.41);
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();

        let order = place_order(&h.state, &customer, vendor.id, vec![item(1_000, 3)], "7 Home Street")
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.drop_off_location.is_resolved());
        assert!(h.state.orders.assignment_candidates().is_empty());
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let h = Harness::new();
        let customer = h.customer("ada@example.com");
        let vendor = h.vendor_with_point();

        let err = place_order(&h.state, &customer, vendor.id, Vec::new(), "7 Home Street")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
