//! Users and the courier directory they form.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::geocoder::{Requirement, relocate, resolve_location};
use crate::models::user::{CourierStatus, Role, User};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub address: Option<String>,
}

pub async fn register_user(state: &AppState, new_user: NewUser) -> Result<User, AppError> {
    let name = new_user.name.trim();
    if name.len() < 3 || name.len() > 50 {
        return Err(AppError::BadRequest(
            "name must be between 3 and 50 characters".to_string(),
        ));
    }

    let email = new_user.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::BadRequest("please provide a valid email".to_string()));
    }
    if state.users.email_taken(&email) {
        return Err(AppError::Conflict(format!("email {email} is already registered")));
    }

    let location = match new_user.address.as_deref().map(str::trim) {
        Some(address) if !address.is_empty() => Some(
            resolve_location(
                state.geocoder.as_ref(),
                address,
                Requirement::Optional,
                state.settings.gateway_timeout,
            )
            .await?,
        ),
        _ => None,
    };

    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email,
        role: new_user.role,
        status: CourierStatus::Available,
        location,
        updated_at: Utc::now(),
    };

    let user = state.users.insert_registered(user);
    info!(user_id = %user.id, role = ?user.role, "user registered");
    Ok(user)
}

/// Sets the user's address. An empty address removes the location entirely.
pub async fn update_address(state: &AppState, user: &User, address: &str) -> Result<User, AppError> {
    if address.trim().is_empty() {
        return state.users.set_location(user.id, None);
    }

    let location = relocate(
        state.geocoder.as_ref(),
        user.location.as_ref(),
        address,
        Requirement::Optional,
        state.settings.gateway_timeout,
    )
    .await?;

    state.users.set_location(user.id, Some(location))
}

pub fn apply_as_courier(state: &AppState, user: &User) -> Result<User, AppError> {
    let courier = state.users.promote_to_courier(user.id)?;
    info!(courier_id = %courier.id, "user registered as courier");
    Ok(courier)
}

/// Flips available ↔ busy. A courier still carrying a delivery stays busy
/// until it is delivered or canceled.
pub fn toggle_status(state: &AppState, courier: &User) -> Result<User, AppError> {
    let current = state.users.require(courier.id)?;
    if current.status == CourierStatus::Busy {
        if let Some(delivery) = state.deliveries.current_for(courier.id) {
            return Err(AppError::Conflict(format!(
                "finish or cancel delivery {} before going available",
                delivery.id
            )));
        }
    }
    state.users.toggle_courier_status(courier.id)
}

pub fn set_courier_status(
    state: &AppState,
    admin: &User,
    courier_id: Uuid,
    status: CourierStatus,
) -> Result<User, AppError> {
    require_admin(admin)?;
    let courier = state.users.set_courier_status(courier_id, status)?;
    info!(courier_id = %courier_id, status = ?status, admin_id = %admin.id, "courier status set by admin");
    Ok(courier)
}

pub fn list_couriers(state: &AppState, admin: &User) -> Result<Vec<User>, AppError> {
    require_admin(admin)?;
    Ok(state.users.couriers())
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if user.role != Role::Admin {
        return Err(AppError::Forbidden("admin role required".to_string()));
    }
    Ok(())
}
