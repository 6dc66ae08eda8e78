//! User management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::user::{CreateUser, User},
};

use super::CurrentPrincipal;

/// The calling principal's own profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    responses(
        (status = 200, description = "The current user", body = User),
        (status = 403, description = "Unknown principal")
    )
)]
pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<User> {
    Json(principal)
}

/// List all users (staff only)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = Vec<User>),
        (status = 403, description = "Not staff")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<Vec<User>>> {
    let users = state.services.membership.list_users(&principal).await?;
    Ok(Json(users))
}

/// Get a user (self or staff)
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 403, description = "Not the user or staff"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    let user = state.services.membership.get_user(id, &principal).await?;
    Ok(Json(user))
}

/// Register a user (admin only)
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 403, description = "Not admin"),
        (status = 409, description = "Duplicate email")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state
        .services
        .membership
        .create_user(request, &principal)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}
