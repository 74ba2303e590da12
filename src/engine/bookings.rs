use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::ledger::SeatLedger;
use super::{lock_trip, Caller, Engine};
use crate::entities::booking::{self, BookingStatus};
use crate::entities::trip::TripStatus;
use crate::error::{AppError, AppResult};
use crate::services::{AuditAction, AuditEntry};

impl Engine {
    /// Books seats for a passenger. A rejected attempt is kept as a cancelled
    /// booking and the rejection is returned.
    pub async fn book_trip(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        seats: i32,
    ) -> AppResult<booking::Model> {
        if seats <= 0 {
            return Err(AppError::InvalidRequest(
                "Seats must be a positive number".to_string(),
            ));
        }
        if !self.directory.user_exists(user_id).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let _guard = self.locks.lock(trip_id).await;
        let txn = self.db.begin().await?;
        let mut trip = lock_trip(&txn, trip_id).await?;

        let existing = booking::Entity::find()
            .filter(booking::Column::TripId.eq(trip_id))
            .filter(booking::Column::UserId.eq(user_id))
            .filter(booking::Column::Status.ne(BookingStatus::Cancelled))
            .count(&txn)
            .await?;
        if existing > 0 {
            return Err(AppError::AlreadyBooked);
        }

        let total_price_cents = trip
            .price_cents
            .checked_mul(i64::from(seats))
            .ok_or_else(|| AppError::InvalidRequest("Total price is out of range".to_string()))?;

        let now = self.clock.now();
        let pending = booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            trip_id: Set(trip_id),
            user_id: Set(user_id),
            seats_booked: Set(seats),
            total_price_cents: Set(total_price_cents),
            status: Set(BookingStatus::Pending),
            booked_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        match SeatLedger::reserve(&txn, &mut trip, pending.id, seats).await {
            Ok(reservation) => {
                let confirmed = set_status(&txn, pending, BookingStatus::Confirmed, now).await?;
                txn.commit().await?;

                tracing::info!(
                    booking_id = %confirmed.id,
                    %trip_id,
                    %user_id,
                    seats,
                    seats_remaining = reservation.seats_remaining,
                    "Booking confirmed"
                );
                Ok(confirmed)
            }
            Err(e) if is_rejection(&e) => {
                let rejected = set_status(&txn, pending, BookingStatus::Cancelled, now).await?;
                txn.commit().await?;

                tracing::info!(
                    booking_id = %rejected.id,
                    %trip_id,
                    %user_id,
                    seats,
                    reason = e.code(),
                    "Booking rejected"
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Cancels a booking and returns its seats. Cancelling twice is not an error.
    pub async fn cancel_booking(&self, booking_id: Uuid, caller: &Caller) -> AppResult<BookingStatus> {
        let booking = self.get_booking(booking_id).await?;
        let on_behalf = caller.id != booking.user_id;
        if on_behalf {
            self.require_admin(caller).await?;
        }

        let _guard = self.locks.lock(booking.trip_id).await;
        let txn = self.db.begin().await?;
        let mut trip = lock_trip(&txn, booking.trip_id).await?;

        let booking = booking::Entity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.status == BookingStatus::Cancelled {
            return Ok(BookingStatus::Cancelled);
        }
        if trip.status == TripStatus::Completed {
            return Err(AppError::TripAlreadyCompleted);
        }

        SeatLedger::release(&txn, &mut trip, &booking).await?;
        let cancelled = set_status(&txn, booking, BookingStatus::Cancelled, self.clock.now()).await?;
        txn.commit().await?;

        tracing::info!(
            %booking_id,
            trip_id = %cancelled.trip_id,
            seats = cancelled.seats_booked,
            seats_remaining = trip.available_seats(),
            "Booking cancelled"
        );

        if on_behalf {
            self.record_audit(AuditEntry {
                actor_id: caller.id,
                action: AuditAction::Cancel,
                entity_type: "Booking",
                entity_id: booking_id,
                description: format!("Cancelled booking for user {}", cancelled.user_id),
            })
            .await;
        }

        Ok(cancelled.status)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> AppResult<booking::Model> {
        booking::Entity::find_by_id(booking_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    /// Most recent first, including cancelled and rejected attempts.
    pub async fn list_user_bookings(&self, user_id: Uuid) -> AppResult<Vec<booking::Model>> {
        let bookings = booking::Entity::find()
            .filter(booking::Column::UserId.eq(user_id))
            .order_by_desc(booking::Column::BookedAt)
            .all(&self.db)
            .await?;
        Ok(bookings)
    }

    pub async fn list_trip_bookings(&self, trip_id: Uuid) -> AppResult<Vec<booking::Model>> {
        let bookings = booking::Entity::find()
            .filter(booking::Column::TripId.eq(trip_id))
            .order_by_asc(booking::Column::BookedAt)
            .all(&self.db)
            .await?;
        Ok(bookings)
    }
}

/// Business rejections are final and recorded; storage failures roll back.
fn is_rejection(err: &AppError) -> bool {
    !matches!(err, AppError::TransientFailure(_) | AppError::Internal(_))
}

pub(super) async fn set_status<C: ConnectionTrait>(
    conn: &C,
    booking: booking::Model,
    status: BookingStatus,
    now: chrono::DateTime<chrono::Utc>,
) -> AppResult<booking::Model> {
    let mut active: booking::ActiveModel = booking.into();
    active.status = Set(status);
    active.updated_at = Set(now.into());
    Ok(active.update(conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::Harness;
    use chrono::Duration;

    #[tokio::test]
    async fn test_capacity_two_retry_after_cancellation() {
        let h = Harness::new().await;
        let trip = h.trip(2).await;
        let alice = h.passenger().await;
        let bob = h.passenger().await;

        let a = h.engine.book_trip(trip.id, alice, 2).await.unwrap();
        assert_eq!(a.status, BookingStatus::Confirmed);
        assert_eq!(a.total_price_cents, 5_000);

        let err = h.engine.book_trip(trip.id, bob, 1).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::CapacityExceeded {
                requested: 1,
                available: 0
            }
        ));

        h.engine
            .cancel_booking(a.id, &h.passenger_caller(alice))
            .await
            .unwrap();

        let b = h.engine.book_trip(trip.id, bob, 1).await.unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(h.engine.available_seats(trip.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejected_attempt_is_kept_as_cancelled() {
        let h = Harness::new().await;
        let trip = h.trip(1).await;
        let alice = h.passenger().await;
        let bob = h.passenger().await;

        h.engine.book_trip(trip.id, alice, 1).await.unwrap();
        h.engine.book_trip(trip.id, bob, 1).await.unwrap_err();

        let history = h.engine.list_user_bookings(bob).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, BookingStatus::Cancelled);
        assert_eq!(h.engine.verify_inventory(trip.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancel_restores_exact_seats_and_is_idempotent() {
        let h = Harness::new().await;
        let trip = h.trip(10).await;
        let passenger = h.passenger().await;
        let caller = h.passenger_caller(passenger);

        let booking = h.engine.book_trip(trip.id, passenger, 3).await.unwrap();
        assert_eq!(h.engine.available_seats(trip.id).await.unwrap(), 7);

        let first = h.engine.cancel_booking(booking.id, &caller).await.unwrap();
        let second = h.engine.cancel_booking(booking.id, &caller).await.unwrap();

        assert_eq!(first, BookingStatus::Cancelled);
        assert_eq!(second, first);
        assert_eq!(h.engine.available_seats(trip.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_second_active_booking_is_rejected() {
        let h = Harness::new().await;
        let trip = h.trip(10).await;
        let passenger = h.passenger().await;

        let first = h.engine.book_trip(trip.id, passenger, 1).await.unwrap();
        let err = h.engine.book_trip(trip.id, passenger, 1).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyBooked));

        // Booking again is fine once the earlier one is cancelled.
        h.engine
            .cancel_booking(first.id, &h.passenger_caller(passenger))
            .await
            .unwrap();
        h.engine.book_trip(trip.id, passenger, 2).await.unwrap();
        assert_eq!(h.engine.available_seats(trip.id).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_book_validates_input() {
        let h = Harness::new().await;
        let trip = h.trip(4).await;
        let passenger = h.passenger().await;

        let err = h.engine.book_trip(trip.id, passenger, 0).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        let err = h.engine.book_trip(trip.id, Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = h.engine.book_trip(Uuid::new_v4(), passenger, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert!(h.engine.list_user_bookings(passenger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_total_price_overflow_is_rejected() {
        let h = Harness::new().await;
        let mut new_trip = h.new_trip(4);
        new_trip.price_cents = i64::MAX / 2 + 1;
        let trip = h.engine.create_trip(&h.admin, new_trip).await.unwrap();
        let passenger = h.passenger().await;

        let err = h.engine.book_trip(trip.id, passenger, 2).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(h.engine.available_seats(trip.id).await.unwrap(), 4);
        assert!(h.engine.list_user_bookings(passenger).await.unwrap().is_empty());

        let single = h.engine.book_trip(trip.id, passenger, 1).await.unwrap();
        assert_eq!(single.total_price_cents, i64::MAX / 2 + 1);
    }

    #[tokio::test]
    async fn test_only_owner_or_admin_cancels() {
        let h = Harness::new().await;
        let trip = h.trip(4).await;
        let owner = h.passenger().await;
        let stranger = h.passenger().await;
        let booking = h.engine.book_trip(trip.id, owner, 2).await.unwrap();

        let err = h
            .engine
            .cancel_booking(booking.id, &h.passenger_caller(stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let status = h.engine.cancel_booking(booking.id, &h.admin).await.unwrap();
        assert_eq!(status, BookingStatus::Cancelled);

        let audit = h.audit.entries();
        let last = audit.last().unwrap();
        assert_eq!(last.action, AuditAction::Cancel);
        assert_eq!(last.entity_type, "Booking");
        assert_eq!(last.entity_id, booking.id);
    }

    #[tokio::test]
    async fn test_cannot_cancel_after_completion() {
        let h = Harness::new().await;
        let trip = h.trip(4).await;
        let passenger = h.passenger().await;
        let booking = h.engine.book_trip(trip.id, passenger, 1).await.unwrap();

        h.clock.advance(Duration::hours(5));
        let driver = h.driver_caller();
        h.engine
            .transition_trip(trip.id, TripStatus::Ongoing, &driver, None)
            .await
            .unwrap();
        h.engine
            .transition_trip(trip.id, TripStatus::Completed, &driver, None)
            .await
            .unwrap();

        let err = h
            .engine
            .cancel_booking(booking.id, &h.passenger_caller(passenger))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TripAlreadyCompleted));
        assert_eq!(
            h.engine.get_booking(booking.id).await.unwrap().status,
            BookingStatus::Confirmed
        );
    }
}
