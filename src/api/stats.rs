//! Dashboard statistics endpoint

use axum::{extract::State, Json};

use crate::{error::AppResult, services::stats::Dashboard};

use super::CurrentPrincipal;

/// Dashboard counters; staff get the library-wide view, members their own
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Dashboard counters", body = Dashboard)
    )
)]
pub async fn dashboard(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<Dashboard>> {
    let stats = state.services.stats.dashboard(&principal).await?;
    Ok(Json(stats))
}
