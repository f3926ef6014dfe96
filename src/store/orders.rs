use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};

/// Result of applying a payment confirmation.
#[derive(Debug, Clone)]
pub enum PaymentTransition {
    Applied(Order),
    /// The same confirmation was already applied.
    Replayed(Order),
}

#[derive(Default)]
pub struct OrderStore {
    orders: DashMap<Uuid, Order>,
    /// Payment reference → the order it was applied to.
    references: DashMap<String, Uuid>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        if let Some(reference) = &order.reference {
            self.references.insert(reference.clone(), order.id);
        }
        self.orders.insert(order.id, order);
    }

    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.orders.get(&id).map(|entry| entry.value().clone())
    }

    pub fn require(&self, id: Uuid) -> Result<Order, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Paid orders without a courier, oldest first.
    pub fn assignment_candidates(&self) -> Vec<Order> {
        let mut candidates: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().is_assignment_candidate())
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by_key(|order| order.created_at);
        candidates
    }

    /// Binds `reference` to order `id`. Returns whether this call made the
    /// binding, so a failed transition can undo it.
    fn claim_reference(&self, reference: &str, id: Uuid) -> Result<bool, AppError> {
        match self.references.entry(reference.to_string()) {
            Entry::Occupied(owner) if *owner.get() == id => Ok(false),
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "payment reference {reference} already belongs to another order"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(true)
            }
        }
    }

    fn release_reference(&self, reference: &str, id: Uuid) {
        self.references.remove_if(reference, |_, owner| *owner == id);
    }

    /// pending → paid, recording the payment reference. Re-applying the
    /// same reference is reported as [`PaymentTransition::Replayed`]. A
    /// reference belongs to at most one order.
    pub fn mark_paid(&self, id: Uuid, reference: &str) -> Result<PaymentTransition, AppError> {
        let claimed = self.claim_reference(reference, id)?;

        let outcome = self.transition_paid(id, reference);
        if outcome.is_err() && claimed {
            self.release_reference(reference, id);
        }
        outcome
    }

    fn transition_paid(&self, id: Uuid, reference: &str) -> Result<PaymentTransition, AppError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        if order.status != OrderStatus::Pending {
            if order.status != OrderStatus::Failed && order.reference.as_deref() == Some(reference) {
                return Ok(PaymentTransition::Replayed(order.clone()));
            }
            return Err(AppError::Conflict(format!(
                "order {id} is {:?}, expected pending",
                order.status
            )));
        }

        order.status = OrderStatus::Paid;
        order.reference = Some(reference.to_string());
        order.updated_at = Utc::now();
        Ok(PaymentTransition::Applied(order.clone()))
    }

    /// pending → failed.
    pub fn mark_failed(&self, id: Uuid, reference: &str) -> Result<Order, AppError> {
        let claimed = self.claim_reference(reference, id)?;

        let outcome = self.transition_failed(id, reference);
        if outcome.is_err() && claimed {
            self.release_reference(reference, id);
        }
        outcome
    }

    fn transition_failed(&self, id: Uuid, reference: &str) -> Result<Order, AppError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        match order.status {
            OrderStatus::Pending => {
                order.status = OrderStatus::Failed;
                order.reference = Some(reference.to_string());
                order.updated_at = Utc::now();
                Ok(order.clone())
            }
            OrderStatus::Failed => Ok(order.clone()),
            other => Err(AppError::Conflict(format!(
                "order {id} is {other:?}, expected pending"
            ))),
        }
    }

    /// Sets the courier only while the order still awaits one.
    pub fn assign_if_unassigned(&self, id: Uuid, courier: Uuid) -> Result<Order, AppError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        if !order.is_assignment_candidate() {
            return Err(AppError::Conflict(format!("order {id} is already assigned")));
        }

        order.assigned_delivery = Some(courier);
        order.status = OrderStatus::InTransit;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    /// Returns the order to the paid pool, only if `courier` still holds it.
    pub fn release_if_assigned(&self, id: Uuid, courier: Uuid) -> Result<Order, AppError> {
        let mut order = self.held_by(id, courier)?;

        order.assigned_delivery = None;
        order.status = OrderStatus::Paid;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    pub fn complete_if_assigned(&self, id: Uuid, courier: Uuid) -> Result<Order, AppError> {
        let mut order = self.held_by(id, courier)?;

        order.status = OrderStatus::Delivered;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    fn held_by(
        &self,
        id: Uuid,
        courier: Uuid,
    ) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, Order>, AppError> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        if order.assigned_delivery != Some(courier) {
            return Err(AppError::Conflict(format!(
                "order {id} is not held by courier {courier}"
            )));
        }

        Ok(order)
    }
}
