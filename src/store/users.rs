use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_m;
use crate::models::location::{GeoPoint, Location};
use crate::models::user::{CourierStatus, Role, User};

/// Users, and through them the courier directory.
#[derive(Default)]
pub struct UserStore {
    users: DashMap<Uuid, User>,
    admin_bootstrapped: AtomicBool,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Stores a newly registered account. The first account ever registered
    /// becomes the admin.
    pub fn insert_registered(&self, mut user: User) -> User {
        if self.users.is_empty() && !self.admin_bootstrapped.swap(true, Ordering::SeqCst) {
            user.role = Role::Admin;
        }
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    pub fn require(&self, id: Uuid) -> Result<User, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn email_taken(&self, email: &str) -> bool {
        self.users
            .iter()
            .any(|entry| entry.value().email.eq_ignore_ascii_case(email))
    }

    pub fn couriers(&self) -> Vec<User> {
        let mut couriers: Vec<User> = self
            .users
            .iter()
            .filter(|entry| entry.value().is_courier())
            .map(|entry| entry.value().clone())
            .collect();
        couriers.sort_by(|a, b| a.name.cmp(&b.name));
        couriers
    }

    pub fn available_couriers(&self) -> usize {
        self.users
            .iter()
            .filter(|entry| entry.value().is_available_courier())
            .count()
    }

    /// Nearest available courier whose point lies within `max_distance_m` of
    /// `point`, together with its distance in meters.
    pub fn find_nearest(&self, point: &GeoPoint, max_distance_m: f64) -> Option<(User, f64)> {
        self.users
            .iter()
            .filter(|entry| entry.value().is_available_courier())
            .filter_map(|entry| {
                let courier_point = entry.value().location.as_ref()?.point?;
                let distance = haversine_m(point, &courier_point);
                (distance <= max_distance_m).then(|| (entry.value().clone(), distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn set_location(&self, id: Uuid, location: Option<Location>) -> Result<User, AppError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

        user.location = location;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    /// Plain user → vendor owner.
    pub fn promote_to_vendor(&self, id: Uuid) -> Result<User, AppError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

        match user.role {
            Role::User => {}
            Role::Vendor => {
                return Err(AppError::Conflict(format!("user {id} already owns a vendor")));
            }
            Role::Delivery | Role::Admin => {
                return Err(AppError::BadRequest(
                    "only regular users can register a vendor".to_string(),
                ));
            }
        }

        user.role = Role::Vendor;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    /// Plain user → courier. Any other starting role is rejected.
    pub fn promote_to_courier(&self, id: Uuid) -> Result<User, AppError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

        match user.role {
            Role::User => {}
            Role::Delivery => {
                return Err(AppError::BadRequest(
                    "already registered as a courier".to_string(),
                ));
            }
            _ => {
                return Err(AppError::BadRequest(
                    "only regular users can apply to become couriers".to_string(),
                ));
            }
        }

        user.role = Role::Delivery;
        user.status = CourierStatus::Available;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    /// Courier-initiated flip between available and busy.
    pub fn toggle_courier_status(&self, id: Uuid) -> Result<User, AppError> {
        let mut user = self.courier_mut(id)?;

        user.status = match user.status {
            CourierStatus::Available => CourierStatus::Busy,
            CourierStatus::Busy => CourierStatus::Available,
            CourierStatus::Banned => {
                return Err(AppError::Forbidden("courier is banned".to_string()));
            }
        };
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    pub fn set_courier_status(&self, id: Uuid, status: CourierStatus) -> Result<User, AppError> {
        let mut user = self.courier_mut(id)?;

        user.status = status;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    /// available → busy, only if the courier is still available.
    pub fn reserve(&self, id: Uuid) -> Result<User, AppError> {
        let mut user = self.courier_mut(id)?;

        if user.status != CourierStatus::Available {
            return Err(AppError::Conflict(format!("courier {id} is not available")));
        }

        user.status = CourierStatus::Busy;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    /// busy → available. A courier that is already available or banned is
    /// left untouched.
    pub fn release(&self, id: Uuid) {
        if let Some(mut user) = self.users.get_mut(&id) {
            if user.is_courier() && user.status == CourierStatus::Busy {
                user.status = CourierStatus::Available;
                user.updated_at = Utc::now();
            }
        }
    }

    fn courier_mut(
        &self,
        id: Uuid,
    ) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, User>, AppError> {
        let user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

        if !user.is_courier() {
            return Err(AppError::Forbidden(format!("user {id} is not a courier")));
        }

        Ok(user)
    }
}
