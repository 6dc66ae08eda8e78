//! Notification endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, models::notification::Notification};

use super::CurrentPrincipal;

#[derive(Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// Number of notifications flipped to read
    pub marked: u64,
}

/// The caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    responses(
        (status = 200, description = "Own notifications", body = Vec<Notification>)
    )
)]
pub async fn list_notifications(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state.services.notifications.list_own(&principal).await?;
    Ok(Json(notifications))
}

/// Mark one notification as read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Not found or not the recipient")
    )
)]
pub async fn mark_read(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> AppResult<Json<Notification>> {
    let notification = state
        .services
        .notifications
        .mark_read(id, &principal)
        .await?;
    Ok(Json(notification))
}

/// Mark all of the caller's notifications as read
#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "All notifications marked read", body = MarkAllReadResponse)
    )
)]
pub async fn mark_all_read(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<MarkAllReadResponse>> {
    let marked = state
        .services
        .notifications
        .mark_all_read(&principal)
        .await?;
    Ok(Json(MarkAllReadResponse { marked }))
}
