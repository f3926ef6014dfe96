use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{DeliveryRecord, DeliveryStatus};
use crate::models::location::Location;

/// Delivery records plus an index of the single open record per order.
#[derive(Default)]
pub struct DeliveryStore {
    records: DashMap<Uuid, DeliveryRecord>,
    open_by_order: DashMap<Uuid, Uuid>,
}

impl DeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<DeliveryRecord> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    pub fn require(&self, id: Uuid) -> Result<DeliveryRecord, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn open_for_order(&self, order: Uuid) -> Option<DeliveryRecord> {
        let id = *self.open_by_order.get(&order)?;
        self.get(id)
    }

    pub fn for_order(&self, order: Uuid) -> Vec<DeliveryRecord> {
        let mut records: Vec<DeliveryRecord> = self
            .records
            .iter()
            .filter(|entry| entry.value().order == order)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.created_at);
        records
    }

    /// Returns the open record for `order`, inserting the one built by
    /// `build` when there is none. The flag tells whether it was inserted.
    pub fn ensure_open<F>(&self, order: Uuid, build: F) -> Result<(DeliveryRecord, bool), AppError>
    where
        F: FnOnce() -> DeliveryRecord,
    {
        let mut created = false;
        let id = *self.open_by_order.entry(order).or_insert_with(|| {
            let record = build();
            let id = record.id;
            self.records.insert(id, record);
            created = true;
            id
        });

        let record = self
            .get(id)
            .ok_or_else(|| AppError::Internal(format!("open delivery {id} missing for order {order}")))?;
        Ok((record, created))
    }

    pub fn open_unassigned(&self) -> Vec<DeliveryRecord> {
        let mut records: Vec<DeliveryRecord> = self
            .records
            .iter()
            .filter(|entry| {
                let record = entry.value();
                record.status == DeliveryStatus::Pending && record.assigned_delivery.is_none()
            })
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.created_at);
        records
    }

    pub fn current_for(&self, courier: Uuid) -> Option<DeliveryRecord> {
        self.records
            .iter()
            .filter(|entry| {
                let record = entry.value();
                record.is_open() && record.assigned_delivery == Some(courier)
            })
            .map(|entry| entry.value().clone())
            .min_by_key(|record| record.created_at)
    }

    /// Terminal records the courier completed or gave up, most recent first.
    pub fn history_for(&self, courier: Uuid) -> Vec<DeliveryRecord> {
        let mut records: Vec<DeliveryRecord> = self
            .records
            .iter()
            .filter(|entry| {
                let record = entry.value();
                record.status.is_terminal() && record.handled_by(courier)
            })
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records
    }

    /// pending, unassigned → in-transit with `courier`.
    pub fn assign_if_unassigned(&self, id: Uuid, courier: Uuid) -> Result<DeliveryRecord, AppError> {
        let mut record = self.record_mut(id)?;

        if record.assigned_delivery.is_some() {
            return Err(AppError::Conflict(format!("delivery {id} has already been assigned")));
        }
        if record.status != DeliveryStatus::Pending {
            return Err(AppError::Conflict(format!(
                "delivery {id} is {:?} and cannot be assigned",
                record.status
            )));
        }

        record.assigned_delivery = Some(courier);
        record.status = DeliveryStatus::InTransit;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// Undoes [`Self::assign_if_unassigned`] while `courier` still holds the record.
    pub fn revert_assignment(&self, id: Uuid, courier: Uuid) {
        if let Some(mut record) = self.records.get_mut(&id) {
            if record.assigned_delivery == Some(courier) && record.status == DeliveryStatus::InTransit {
                record.assigned_delivery = None;
                record.status = DeliveryStatus::Pending;
                record.updated_at = Utc::now();
            }
        }
    }

    /// Replaces the pickup of a pending, unassigned record when the vendor
    /// has moved since the record was opened.
    pub fn refresh_pickup(&self, id: Uuid, pickup: &Location) -> Option<DeliveryRecord> {
        let mut record = self.records.get_mut(&id)?;

        if record.status != DeliveryStatus::Pending
            || record.assigned_delivery.is_some()
            || record.pickup_location == *pickup
        {
            return None;
        }

        record.pickup_location = pickup.clone();
        record.updated_at = Utc::now();
        Some(record.clone())
    }

    pub fn complete_if_assigned(&self, id: Uuid, courier: Uuid) -> Result<DeliveryRecord, AppError> {
        let mut record = self.held_by(id, courier)?;

        match record.status {
            DeliveryStatus::Delivered => {
                return Err(AppError::BadRequest(format!("delivery {id} is already delivered")));
            }
            DeliveryStatus::Canceled => {
                return Err(AppError::BadRequest(format!("delivery {id} is canceled")));
            }
            DeliveryStatus::Pending | DeliveryStatus::InTransit => {}
        }

        record.status = DeliveryStatus::Delivered;
        record.updated_at = Utc::now();
        let order = record.order;
        let completed = record.clone();
        drop(record);

        self.open_by_order.remove_if(&order, |_, open| *open == id);
        Ok(completed)
    }

    pub fn revert_completion(&self, id: Uuid, courier: Uuid) {
        let order = match self.records.get_mut(&id) {
            Some(mut record)
                if record.assigned_delivery == Some(courier)
                    && record.status == DeliveryStatus::Delivered =>
            {
                record.status = DeliveryStatus::InTransit;
                record.updated_at = Utc::now();
                record.order
            }
            _ => return,
        };
        self.open_by_order.insert(order, id);
    }

    /// Releases the record: canceled, unassigned, remembering who gave it up.
    pub fn cancel_if_assigned(
        &self,
        id: Uuid,
        courier: Uuid,
        reason: &str,
    ) -> Result<DeliveryRecord, AppError> {
        let mut record = self.held_by(id, courier)?;

        if record.status.is_terminal() {
            return Err(AppError::BadRequest(format!(
                "cannot cancel, delivery {id} is already {:?}",
                record.status
            )));
        }

        record.status = DeliveryStatus::Canceled;
        record.cancel_reason = Some(reason.to_string());
        record.canceled_by = Some(courier);
        record.assigned_delivery = None;
        record.updated_at = Utc::now();
        let order = record.order;
        let canceled = record.clone();
        drop(record);

        self.open_by_order.remove_if(&order, |_, open| *open == id);
        Ok(canceled)
    }

    pub fn revert_cancel(&self, id: Uuid, courier: Uuid) {
        let order = match self.records.get_mut(&id) {
            Some(mut record)
                if record.canceled_by == Some(courier)
                    && record.status == DeliveryStatus::Canceled =>
            {
                record.status = DeliveryStatus::InTransit;
                record.assigned_delivery = Some(courier);
                record.cancel_reason = None;
                record.canceled_by = None;
                record.updated_at = Utc::now();
                record.order
            }
            _ => return,
        };
        self.open_by_order.insert(order, id);
    }

    fn record_mut(&self, id: Uuid) -> Result<RefMut<'_, Uuid, DeliveryRecord>, AppError> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
    }

    fn held_by(&self, id: Uuid, courier: Uuid) -> Result<RefMut<'_, Uuid, DeliveryRecord>, AppError> {
        let record = self.record_mut(id)?;

        if record.assigned_delivery != Some(courier) {
            return Err(AppError::Forbidden(format!(
                "courier {courier} is not assigned to delivery {id}"
            )));
        }

        Ok(record)
    }
}
