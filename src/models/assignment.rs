use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentSource {
    Scheduler,
    Claim,
}

impl AssignmentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentSource::Scheduler => "scheduler",
            AssignmentSource::Claim => "claim",
        }
    }
}

/// Match details recorded by the proximity search. Absent for claims.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SearchMatch {
    pub radius_m: u32,
    pub distance_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub delivery_id: Uuid,
    pub courier_id: Uuid,
    pub source: AssignmentSource,
    pub search: Option<SearchMatch>,
    pub assigned_at: DateTime<Utc>,
}
