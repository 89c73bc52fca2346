//! Bestseller API endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, models::GenreBestseller};

#[derive(Serialize, ToSchema)]
pub struct RefreshResponse {
    /// False when a run was already in progress
    pub started: bool,
}

/// List the current bestseller of every genre
#[utoipa::path(
    get,
    path = "/bestsellers",
    tag = "bestsellers",
    responses(
        (status = 200, description = "Bestseller per genre", body = Vec<GenreBestseller>)
    )
)]
pub async fn list_bestsellers(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<GenreBestseller>>> {
    let bestsellers = state.services.bestsellers.current_bestsellers().await?;
    Ok(Json(bestsellers))
}

/// Trigger a bestseller reconciliation run in the background
#[utoipa::path(
    post,
    path = "/bestsellers/refresh",
    tag = "bestsellers",
    responses(
        (status = 202, description = "Run started", body = RefreshResponse),
        (status = 409, description = "A run is already in progress", body = RefreshResponse)
    )
)]
pub async fn refresh_bestsellers(
    State(state): State<crate::AppState>,
) -> (StatusCode, Json<RefreshResponse>) {
    // Fire and forget; the run logs its own outcome
    match state.services.bestsellers.try_start() {
        Some(_) => (StatusCode::ACCEPTED, Json(RefreshResponse { started: true })),
        None => (StatusCode::CONFLICT, Json(RefreshResponse { started: false })),
    }
}
