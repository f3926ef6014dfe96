use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::Location;
use crate::models::order::Order;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    Pending,
    InTransit,
    Delivered,
    Canceled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Canceled)
    }
}

/// Tracks moving one paid order from its vendor to the customer.
///
/// `assigned_delivery` always agrees with the owning order's field of the same
/// name. A canceled record keeps the courier that gave it up in `canceled_by`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub order: Uuid,
    pub vendor: Uuid,
    pub customer: Uuid,
    pub assigned_delivery: Option<Uuid>,
    pub pickup_location: Location,
    pub dropoff_location: Location,
    pub status: DeliveryStatus,
    pub cancel_reason: Option<String>,
    pub canceled_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Fresh unassigned record moving `order` from `pickup` to its drop-off.
    pub fn open_for(order: &Order, pickup: Location) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order: order.id,
            vendor: order.vendor,
            customer: order.customer,
            assigned_delivery: None,
            pickup_location: pickup,
            dropoff_location: order.drop_off_location.clone(),
            status: DeliveryStatus::Pending,
            cancel_reason: None,
            canceled_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Whether `courier` handled this record, either to completion or up to
    /// cancellation.
    pub fn handled_by(&self, courier: Uuid) -> bool {
        self.assigned_delivery == Some(courier) || self.canceled_by == Some(courier)
    }
}
