use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::Location;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: Location,
    pub updated_at: DateTime<Utc>,
}
