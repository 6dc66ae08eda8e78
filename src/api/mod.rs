//! API handlers for Libris REST endpoints

pub mod books;
pub mod health;
pub mod loans;
pub mod notifications;
pub mod openapi;
pub mod stats;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HeaderName, request::Parts},
};
use once_cell::sync::Lazy;

use crate::{error::AppError, models::user::User, AppState};

/// Header set by the authenticating gateway in front of this service
static PRINCIPAL_HEADER: Lazy<HeaderName> = Lazy::new(|| HeaderName::from_static("x-principal-id"));

/// Extractor for the calling principal.
///
/// Authentication happens upstream; this service trusts the gateway-injected
/// principal id and resolves it to a user record with its role.
pub struct CurrentPrincipal(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(&*PRINCIPAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::PermissionDenied("Missing x-principal-id header".to_string())
            })?;

        let id: i64 = raw
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid principal id: {}", raw)))?;

        let user = state
            .repository
            .users
            .get_by_id(id)
            .await
            .map_err(|_| AppError::PermissionDenied("Unknown principal".to_string()))?;

        Ok(CurrentPrincipal(user))
    }
}
