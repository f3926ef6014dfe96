use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// Header carrying the id of the caller, set by the authenticating proxy.
pub const USER_HEADER: &str = "x-user-id";

/// The authenticated caller.
pub struct Actor(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_HEADER} header")))?
            .to_str()
            .map_err(|_| AppError::Unauthorized(format!("malformed {USER_HEADER} header")))?;

        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::Unauthorized(format!("malformed {USER_HEADER} header")))?;

        state
            .users
            .get(id)
            .map(Actor)
            .ok_or_else(|| AppError::Unauthorized(format!("unknown user {id}")))
    }
}

impl Actor {
    pub fn courier(self) -> Result<User, AppError> {
        if !self.0.is_courier() {
            return Err(AppError::Forbidden("courier role required".to_string()));
        }
        Ok(self.0)
    }
}
