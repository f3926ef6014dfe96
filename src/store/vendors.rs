use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::location::Location;
use crate::models::vendor::Vendor;

#[derive(Default)]
pub struct VendorStore {
    vendors: DashMap<Uuid, Vendor>,
}

impl VendorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, vendor: Vendor) {
        self.vendors.insert(vendor.id, vendor);
    }

    pub fn get(&self, id: Uuid) -> Option<Vendor> {
        self.vendors.get(&id).map(|entry| entry.value().clone())
    }

    pub fn require(&self, id: Uuid) -> Result<Vendor, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("vendor {id} not found")))
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    pub fn owned_by(&self, owner: Uuid) -> Option<Vendor> {
        self.vendors
            .iter()
            .find(|entry| entry.value().owner == owner)
            .map(|entry| entry.value().clone())
    }

    pub fn set_location(&self, id: Uuid, owner: Uuid, location: Location) -> Result<Vendor, AppError> {
        let mut vendor = self
            .vendors
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("vendor {id} not found")))?;

        if vendor.owner != owner {
            return Err(AppError::Forbidden(format!("vendor {id} belongs to another user")));
        }

        vendor.location = location;
        vendor.updated_at = Utc::now();
        Ok(vendor.clone())
    }
}
