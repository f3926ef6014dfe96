use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::Location;

/// `Pending` is strictly pre-payment. `Paid` means payment confirmed and the
/// order is waiting for a courier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Paid,
    InTransit,
    Delivered,
    Cancelled,
    Failed,
}

impl OrderStatus {
    /// Statuses the scheduler considers when the order has no courier.
    pub fn awaits_courier(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::InTransit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    /// Minor currency units.
    pub unit_price: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer: Uuid,
    pub vendor: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub tax: i64,
    pub shipping_fee: i64,
    pub total: i64,
    pub reference: Option<String>,
    pub status: OrderStatus,
    pub assigned_delivery: Option<Uuid>,
    pub drop_off_location: Location,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_assignment_candidate(&self) -> bool {
        self.status.awaits_courier() && self.assigned_delivery.is_none()
    }
}
