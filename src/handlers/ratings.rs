use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::engine::{RatingScores, RatingSummary};
use crate::entities::rating;
use crate::error::AppResult;
use crate::utils::jwt::Claims;
use crate::AppState;

/// Rate a completed trip the passenger rode on
pub async fn submit_rating(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<RatingScores>,
) -> AppResult<(StatusCode, Json<rating::Model>)> {
    let rating = state
        .engine
        .submit_rating(trip_id, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn driver_rating(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
) -> AppResult<Json<RatingSummary>> {
    Ok(Json(state.engine.driver_average(driver_id).await?))
}

pub async fn vehicle_rating(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<Json<RatingSummary>> {
    Ok(Json(state.engine.vehicle_average(vehicle_id).await?))
}
