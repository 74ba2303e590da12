use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{lock_trip, Caller, Engine};
use crate::entities::trip::{self, TripStatus};
use crate::error::{AppError, AppResult};
use crate::services::{AuditAction, AuditEntry};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub trip_name: String,
    pub start_location: String,
    pub end_location: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_cents: i64,
    pub capacity: i32,
}

/// Fields an admin may change while a trip is still upcoming. Capacity is fixed
/// at creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripPatch {
    pub trip_name: Option<String>,
    pub start_location: Option<String>,
    pub end_location: Option<String>,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub price_cents: Option<i64>,
}

impl NewTrip {
    fn validate(&self) -> AppResult<()> {
        require_text("trip_name", &self.trip_name)?;
        require_text("start_location", &self.start_location)?;
        require_text("end_location", &self.end_location)?;

        if self.capacity <= 0 {
            return Err(AppError::InvalidRequest(
                "Capacity must be at least 1".to_string(),
            ));
        }
        validate_price(self.price_cents)?;
        validate_schedule(self.departure_time, self.arrival_time)
    }
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn validate_price(price_cents: i64) -> AppResult<()> {
    if price_cents < 0 {
        return Err(AppError::InvalidRequest(
            "Price must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_schedule(departure: DateTime<Utc>, arrival: DateTime<Utc>) -> AppResult<()> {
    if arrival <= departure {
        return Err(AppError::InvalidRequest(
            "Arrival time must be after departure time".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    pub async fn create_trip(&self, caller: &Caller, new_trip: NewTrip) -> AppResult<trip::Model> {
        self.require_admin(caller).await?;
        new_trip.validate()?;

        if !self.directory.driver_exists(new_trip.driver_id).await? {
            return Err(AppError::NotFound("Driver not found".to_string()));
        }
        if !self.directory.vehicle_exists(new_trip.vehicle_id).await? {
            return Err(AppError::NotFound("Vehicle not found".to_string()));
        }

        let now = self.clock.now();
        let trip = trip::ActiveModel {
            id: Set(Uuid::new_v4()),
            driver_id: Set(new_trip.driver_id),
            vehicle_id: Set(new_trip.vehicle_id),
            trip_name: Set(new_trip.trip_name.trim().to_string()),
            start_location: Set(new_trip.start_location.trim().to_string()),
            end_location: Set(new_trip.end_location.trim().to_string()),
            departure_time: Set(new_trip.departure_time.into()),
            arrival_time: Set(new_trip.arrival_time.into()),
            price_cents: Set(new_trip.price_cents),
            capacity: Set(new_trip.capacity),
            seats_committed: Set(0),
            status: Set(TripStatus::Upcoming),
            cancelled_by: Set(None),
            cancellation_reason: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(trip_id = %trip.id, capacity = trip.capacity, "Trip created");
        self.record_audit(AuditEntry {
            actor_id: caller.id,
            action: AuditAction::Create,
            entity_type: "Trip",
            entity_id: trip.id,
            description: format!("Created trip: {}", trip.trip_name),
        })
        .await;

        Ok(trip)
    }

    pub async fn update_trip(
        &self,
        trip_id: Uuid,
        caller: &Caller,
        patch: TripPatch,
    ) -> AppResult<trip::Model> {
        self.require_admin(caller).await?;

        let _guard = self.locks.lock(trip_id).await;
        let txn = self.db.begin().await?;
        let trip = lock_trip(&txn, trip_id).await?;

        if trip.status != TripStatus::Upcoming {
            return Err(AppError::TripLocked(trip.status));
        }

        let departure = patch
            .departure_time
            .unwrap_or_else(|| trip.departure_time.with_timezone(&Utc));
        let arrival = patch
            .arrival_time
            .unwrap_or_else(|| trip.arrival_time.with_timezone(&Utc));
        validate_schedule(departure, arrival)?;

        let mut active: trip::ActiveModel = trip.into();

        if let Some(name) = patch.trip_name {
            require_text("trip_name", &name)?;
            active.trip_name = Set(name.trim().to_string());
        }
        if let Some(start) = patch.start_location {
            require_text("start_location", &start)?;
            active.start_location = Set(start.trim().to_string());
        }
        if let Some(end) = patch.end_location {
            require_text("end_location", &end)?;
            active.end_location = Set(end.trim().to_string());
        }
        if let Some(price) = patch.price_cents {
            validate_price(price)?;
            active.price_cents = Set(price);
        }
        if patch.departure_time.is_some() {
            active.departure_time = Set(departure.into());
        }
        if patch.arrival_time.is_some() {
            active.arrival_time = Set(arrival.into());
        }
        active.updated_at = Set(self.clock.now().into());

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(%trip_id, "Trip updated");
        self.record_audit(AuditEntry {
            actor_id: caller.id,
            action: AuditAction::Update,
            entity_type: "Trip",
            entity_id: trip_id,
            description: format!("Updated trip: {}", updated.trip_name),
        })
        .await;

        Ok(updated)
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> AppResult<trip::Model> {
        trip::Entity::find_by_id(trip_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))
    }

    /// Latest departures first.
    pub async fn list_trips(&self, status: Option<TripStatus>) -> AppResult<Vec<trip::Model>> {
        let mut query = trip::Entity::find().order_by_desc(trip::Column::DepartureTime);
        if let Some(status) = status {
            query = query.filter(trip::Column::Status.eq(status));
        }
        Ok(query.all(&self.db).await?)
    }
}
