use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::Location;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Vendor,
    Delivery,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CourierStatus {
    Available,
    Busy,
    Banned,
}

/// Marketplace user. Couriers are users with [`Role::Delivery`]; `status` is
/// only meaningful for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: CourierStatus,
    pub location: Option<Location>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_courier(&self) -> bool {
        self.role == Role::Delivery
    }

    pub fn is_available_courier(&self) -> bool {
        self.is_courier() && self.status == CourierStatus::Available
    }
}
