use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::bookings::set_status;
use super::ledger::SeatLedger;
use super::{lock_trip, Caller, CallerRole, Engine};
use crate::entities::booking::{self, BookingStatus};
use crate::entities::driver;
use crate::entities::trip::{self, TripStatus};
use crate::error::{AppError, AppResult};
use crate::services::{AuditAction, AuditEntry};

const DEFAULT_CANCEL_REASON: &str = "Trip cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Apply,
    /// Repeating the current state; reported as success without a write.
    Unchanged,
}

fn plan_transition(from: TripStatus, to: TripStatus) -> AppResult<Step> {
    use TripStatus::*;

    match (from, to) {
        (Cancelled, Cancelled) | (Ongoing, Ongoing) => Ok(Step::Unchanged),
        (Completed, _) | (Cancelled, _) => Err(AppError::AlreadyCompleted(from)),
        (Upcoming, Ongoing) | (Ongoing, Completed) | (Upcoming | Ongoing, Cancelled) => {
            Ok(Step::Apply)
        }
        _ => Err(AppError::InvalidTransition { from, to }),
    }
}

impl Engine {
    /// Moves a trip through its lifecycle. Cancellation cascades to every active
    /// booking in the same transaction; passengers are notified after commit.
    pub async fn transition_trip(
        &self,
        trip_id: Uuid,
        target: TripStatus,
        caller: &Caller,
        reason: Option<String>,
    ) -> AppResult<TripStatus> {
        let driver_id = self.require_trip_operator(caller, trip_id).await?.driver_id;

        let _guards = self.locks.lock_many([trip_id, driver_id]).await;
        let txn = self.db.begin().await?;
        let mut trip = lock_trip(&txn, trip_id).await?;
        let from = trip.status;

        if plan_transition(from, target)? == Step::Unchanged {
            tracing::debug!(%trip_id, status = ?from, "Transition repeats current status");
            return Ok(from);
        }

        let now = self.clock.now();
        let mut overridden = false;
        match target {
            TripStatus::Ongoing if now < trip.departure_time.with_timezone(&Utc) => {
                if caller.role != CallerRole::Admin {
                    return Err(AppError::NotYetDeparted);
                }
                overridden = true;
            }
            TripStatus::Completed if now < trip.arrival_time.with_timezone(&Utc) => {
                return Err(AppError::TripStillInProgress);
            }
            _ => {}
        }

        let mut cancelled_passengers = Vec::new();
        let cancel_reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());

        if target == TripStatus::Cancelled {
            let active = booking::Entity::find()
                .filter(booking::Column::TripId.eq(trip_id))
                .filter(booking::Column::Status.ne(BookingStatus::Cancelled))
                .all(&txn)
                .await?;

            for booking in active {
                SeatLedger::release(&txn, &mut trip, &booking).await?;
                let cancelled = set_status(&txn, booking, BookingStatus::Cancelled, now).await?;
                cancelled_passengers.push(cancelled.user_id);
            }
        }

        if target == TripStatus::Completed {
            let driver = driver::Entity::find_by_id(trip.driver_id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;
            let total_trips = driver.total_trips + 1;
            let mut active: driver::ActiveModel = driver.into();
            active.total_trips = Set(total_trips);
            active.update(&txn).await?;
        }

        let mut active: trip::ActiveModel = trip.into();
        active.status = Set(target);
        active.updated_at = Set(now.into());
        if target == TripStatus::Cancelled {
            active.cancelled_by = Set(caller.role.cancelled_by());
            active.cancellation_reason = Set(Some(cancel_reason.clone()));
        }
        active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(
            %trip_id,
            from = ?from,
            to = ?target,
            role = ?caller.role,
            bookings_cancelled = cancelled_passengers.len(),
            "Trip status changed"
        );

        if target == TripStatus::Cancelled {
            self.notify_passengers(trip_id, &cancelled_passengers, &cancel_reason)
                .await;
            self.record_audit(AuditEntry {
                actor_id: caller.id,
                action: AuditAction::Cancel,
                entity_type: "Trip",
                entity_id: trip_id,
                description: format!(
                    "Cancelled trip ({} bookings): {}",
                    cancelled_passengers.len(),
                    cancel_reason
                ),
            })
            .await;
        } else if caller.role == CallerRole::Admin {
            let description = if overridden {
                format!("Moved trip from {:?} to {:?} before departure", from, target)
            } else {
                format!("Moved trip from {:?} to {:?}", from, target)
            };
            self.record_audit(AuditEntry {
                actor_id: caller.id,
                action: AuditAction::StatusOverride,
                entity_type: "Trip",
                entity_id: trip_id,
                description,
            })
            .await;
        }

        Ok(target)
    }

    /// Trips assigned to the calling driver, latest departures first.
    pub async fn list_driver_trips(
        &self,
        caller: &Caller,
        status: Option<TripStatus>,
    ) -> AppResult<Vec<trip::Model>> {
        if caller.role != CallerRole::Driver {
            return Err(AppError::Forbidden("Driver access required".to_string()));
        }

        let profile = driver::Entity::find()
            .filter(driver::Column::UserId.eq(caller.id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Driver profile not found".to_string()))?;

        let mut query = trip::Entity::find()
            .filter(trip::Column::DriverId.eq(profile.id))
            .order_by_desc(trip::Column::DepartureTime);
        if let Some(status) = status {
            query = query.filter(trip::Column::Status.eq(status));
        }
        Ok(query.all(&self.db).await?)
    }

    /// Confirmed bookings on a trip, for its driver or an admin.
    pub async fn list_trip_passengers(
        &self,
        trip_id: Uuid,
        caller: &Caller,
    ) -> AppResult<Vec<booking::Model>> {
        self.require_trip_operator(caller, trip_id).await?;

        let bookings = booking::Entity::find()
            .filter(booking::Column::TripId.eq(trip_id))
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
            .order_by_asc(booking::Column::BookedAt)
            .all(&self.db)
            .await?;
        Ok(bookings)
    }
}
