use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{NewTrip, TripPatch};
use crate::entities::booking;
use crate::entities::trip::{self, CancelledBy, TripStatus};
use crate::error::AppResult;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub trip_name: String,
    pub start_location: String,
    pub end_location: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_cents: i64,
    pub capacity: i32,
    pub available_seats: i32,
    pub status: TripStatus,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
}

impl From<trip::Model> for TripResponse {
    fn from(t: trip::Model) -> Self {
        Self {
            id: t.id,
            driver_id: t.driver_id,
            vehicle_id: t.vehicle_id,
            available_seats: t.available_seats(),
            trip_name: t.trip_name,
            start_location: t.start_location,
            end_location: t.end_location,
            departure_time: t.departure_time.with_timezone(&Utc),
            arrival_time: t.arrival_time.with_timezone(&Utc),
            price_cents: t.price_cents,
            capacity: t.capacity,
            status: t.status,
            cancelled_by: t.cancelled_by,
            cancellation_reason: t.cancellation_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListTripsQuery {
    pub status: Option<TripStatus>,
}

#[derive(Debug, Serialize)]
pub struct SeatsResponse {
    pub trip_id: Uuid,
    pub capacity: i32,
    pub available_seats: i32,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: TripStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    pub trip_id: Uuid,
    pub status: TripStatus,
}

/// List trips, optionally filtered by `?status=`
pub async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<ListTripsQuery>,
) -> AppResult<Json<Vec<TripResponse>>> {
    let trips = state.engine.list_trips(query.status).await?;
    Ok(Json(trips.into_iter().map(TripResponse::from).collect()))
}

pub async fn get_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> AppResult<Json<TripResponse>> {
    let trip = state.engine.get_trip(trip_id).await?;
    Ok(Json(trip.into()))
}

pub async fn available_seats(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> AppResult<Json<SeatsResponse>> {
    let trip = state.engine.get_trip(trip_id).await?;
    Ok(Json(SeatsResponse {
        trip_id,
        capacity: trip.capacity,
        available_seats: trip.available_seats(),
    }))
}

/// Create a trip (admin)
pub async fn create_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewTrip>,
) -> AppResult<(StatusCode, Json<TripResponse>)> {
    let trip = state.engine.create_trip(&claims.caller(), payload).await?;
    Ok((StatusCode::CREATED, Json(trip.into())))
}

/// Update an upcoming trip (admin)
pub async fn update_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<TripPatch>,
) -> AppResult<Json<TripResponse>> {
    let trip = state
        .engine
        .update_trip(trip_id, &claims.caller(), payload)
        .await?;
    Ok(Json(trip.into()))
}

/// Start, complete or cancel a trip. Shared by the admin and driver routes;
/// the engine checks that a driver is assigned to the trip.
pub async fn change_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<StatusChangeRequest>,
) -> AppResult<Json<StatusChangeResponse>> {
    let status = state
        .engine
        .transition_trip(trip_id, payload.status, &claims.caller(), payload.reason)
        .await?;
    Ok(Json(StatusChangeResponse { trip_id, status }))
}

/// Every booking on a trip, including cancelled ones (admin)
pub async fn trip_bookings(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> AppResult<Json<Vec<booking::Model>>> {
    state.engine.get_trip(trip_id).await?;
    Ok(Json(state.engine.list_trip_bookings(trip_id).await?))
}

/// Trips assigned to the authenticated driver, newest departure first
pub async fn my_trips(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListTripsQuery>,
) -> AppResult<Json<Vec<TripResponse>>> {
    let trips = state
        .engine
        .list_driver_trips(&claims.caller(), query.status)
        .await?;
    Ok(Json(trips.into_iter().map(TripResponse::from).collect()))
}

/// Confirmed passengers on one of the driver's trips
pub async fn trip_passengers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(trip_id): Path<Uuid>,
) -> AppResult<Json<Vec<booking::Model>>> {
    let bookings = state
        .engine
        .list_trip_passengers(trip_id, &claims.caller())
        .await?;
    Ok(Json(bookings))
}
