use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::geocoder::{Requirement, relocate, resolve_location};
use crate::models::user::User;
use crate::models::vendor::Vendor;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct NewVendor {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Registers a vendor owned by `owner`. The address is required but a
/// failed geocode only leaves the vendor without a point; such vendors'
/// orders wait in the pool until the address is fixed.
pub async fn register_vendor(state: &AppState, owner: &User, new_vendor: NewVendor) -> Result<Vendor, AppError> {
    if new_vendor.name.trim().is_empty() {
        return Err(AppError::BadRequest("vendor name is required".to_string()));
    }
    if new_vendor.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone number is required".to_string()));
    }
    if state.vendors.owned_by(owner.id).is_some() {
        return Err(AppError::Conflict(format!(
            "user {} already owns a vendor",
            owner.id
        )));
    }

    let location = resolve_location(
        state.geocoder.as_ref(),
        &new_vendor.address,
        Requirement::Optional,
        state.settings.gateway_timeout,
    )
    .await?;
    if !location.is_resolved() {
        warn!(owner_id = %owner.id, "vendor registered without a resolved pickup point");
    }

    let vendor = Vendor {
        id: Uuid::new_v4(),
        owner: owner.id,
        name: new_vendor.name.trim().to_string(),
        email: new_vendor.email.trim().to_lowercase(),
        phone: new_vendor.phone.trim().to_string(),
        location,
        updated_at: Utc::now(),
    };

    state.users.promote_to_vendor(owner.id)?;
    state.vendors.insert(vendor.clone());
    info!(vendor_id = %vendor.id, owner_id = %owner.id, "vendor registered");
    Ok(vendor)
}

pub async fn update_vendor_address(
    state: &AppState,
    owner: &User,
    vendor_id: Uuid,
    address: &str,
) -> Result<Vendor, AppError> {
    let vendor = state.vendors.require(vendor_id)?;
    if vendor.owner != owner.id {
        return Err(AppError::Forbidden(format!(
            "vendor {vendor_id} belongs to another user"
        )));
    }

    let location = relocate(
        state.geocoder.as_ref(),
        Some(&vendor.location),
        address,
        Requirement::Optional,
        state.settings.gateway_timeout,
    )
    .await?;

    state.vendors.set_location(vendor_id, owner.id, location)
}
