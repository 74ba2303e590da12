use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::error::AppResult;
use crate::handlers::{bookings, ratings, trips};
use crate::middleware::auth::{auth_middleware, require_admin, require_driver, require_passenger};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

pub fn create_router(state: AppState) -> AppResult<Router> {
    let driver_governor = create_role_governor(RateLimitedRole::Driver)?;
    let passenger_governor = create_role_governor(RateLimitedRole::Passenger)?;
    let public_governor = create_public_governor()?;

    // Catalog and rating reads, limited per IP
    let public_routes = Router::new()
        .route("/api/trips", get(trips::list_trips))
        .route("/api/trips/{id}", get(trips::get_trip))
        .route("/api/trips/{id}/seats", get(trips::available_seats))
        .route("/api/drivers/{id}/rating", get(ratings::driver_rating))
        .route("/api/vehicles/{id}/rating", get(ratings::vehicle_rating))
        .layer(public_governor);

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        .route("/api/admin/trips", post(trips::create_trip))
        .route("/api/admin/trips/{id}", put(trips::update_trip))
        .route("/api/admin/trips/{id}/status", post(trips::change_status))
        .route("/api/admin/trips/{id}/bookings", get(trips::trip_bookings))
        .route("/api/admin/bookings/{id}", delete(bookings::cancel_booking))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Driver routes (requires auth + driver role)
    let driver_routes = Router::new()
        .route("/api/driver/trips", get(trips::my_trips))
        .route("/api/driver/trips/{id}/bookings", get(trips::trip_passengers))
        .route("/api/driver/trips/{id}/status", post(trips::change_status))
        .layer(driver_governor)
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Passenger routes (requires auth + passenger role)
    let passenger_routes = Router::new()
        .route(
            "/api/bookings",
            post(bookings::create_booking).get(bookings::my_bookings),
        )
        .route("/api/bookings/{id}", delete(bookings::cancel_booking))
        .route("/api/trips/{id}/ratings", post(ratings::submit_rating))
        .layer(passenger_governor)
        .layer(middleware::from_fn(require_passenger))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Ok(Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(driver_routes)
        .merge(passenger_routes)
        .with_state(state))
}
