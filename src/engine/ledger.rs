//! Seat inventory ledger.
//!
//! `trip.seats_committed` is the materialized sum of seats held by pending and
//! confirmed bookings. Reserve and release both run inside the caller's
//! transaction, on a trip row the caller already holds locked, so the capacity
//! check and the counter write can never interleave with another writer.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use uuid::Uuid;

use super::Engine;
use crate::entities::booking::{self, BookingStatus};
use crate::entities::trip::{self, TripStatus};
use crate::error::{AppError, AppResult};

/// Seats granted to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub booking_id: Uuid,
    pub trip_id: Uuid,
    pub seats: i32,
    pub seats_remaining: i32,
}

pub struct SeatLedger;

impl SeatLedger {
    pub async fn reserve<C: ConnectionTrait>(
        conn: &C,
        trip: &mut trip::Model,
        booking_id: Uuid,
        seats: i32,
    ) -> AppResult<Reservation> {
        if seats <= 0 || seats > trip.capacity {
            return Err(AppError::InvalidRequest(format!(
                "Seats must be between 1 and {}",
                trip.capacity
            )));
        }

        if trip.status != TripStatus::Upcoming {
            return Err(AppError::TripNotBookable(trip.status));
        }

        let available = trip.available_seats();
        if seats > available {
            return Err(AppError::CapacityExceeded {
                requested: seats,
                available,
            });
        }

        let committed = trip.seats_committed + seats;
        write_committed(conn, trip, committed).await?;

        Ok(Reservation {
            booking_id,
            trip_id: trip.id,
            seats,
            seats_remaining: trip.available_seats(),
        })
    }

    /// Returns the booking's seats to the trip. Releasing a booking that is already
    /// cancelled is a no-op and returns `false`; the caller flips the booking status
    /// afterwards in the same transaction.
    pub async fn release<C: ConnectionTrait>(
        conn: &C,
        trip: &mut trip::Model,
        booking: &booking::Model,
    ) -> AppResult<bool> {
        if !booking.status.is_active() {
            return Ok(false);
        }

        if booking.trip_id != trip.id {
            return Err(AppError::Internal(format!(
                "Booking {} does not belong to trip {}",
                booking.id, trip.id
            )));
        }

        let mut committed = trip.seats_committed - booking.seats_booked;
        if committed < 0 {
            tracing::warn!(
                trip_id = %trip.id,
                booking_id = %booking.id,
                committed,
                "Seat counter went negative on release, clamping to zero"
            );
            committed = 0;
        }

        write_committed(conn, trip, committed).await?;
        Ok(true)
    }

    /// Recomputes the committed seat total from booking rows.
    pub async fn recount<C: ConnectionTrait>(conn: &C, trip_id: Uuid) -> AppResult<i32> {
        let seats = booking::Entity::find()
            .filter(booking::Column::TripId.eq(trip_id))
            .filter(booking::Column::Status.ne(BookingStatus::Cancelled))
            .all(conn)
            .await?
            .iter()
            .map(|b| b.seats_booked)
            .sum();

        Ok(seats)
    }
}

async fn write_committed<C: ConnectionTrait>(
    conn: &C,
    trip: &mut trip::Model,
    committed: i32,
) -> AppResult<()> {
    let mut active: trip::ActiveModel = trip.clone().into();
    active.seats_committed = Set(committed);
    *trip = active.update(conn).await?;
    Ok(())
}

impl Engine {
    pub async fn available_seats(&self, trip_id: Uuid) -> AppResult<i32> {
        let trip = self.get_trip(trip_id).await?;
        Ok(trip.available_seats())
    }

    /// Compares the materialized counter with a full recount; returns the recount.
    pub async fn verify_inventory(&self, trip_id: Uuid) -> AppResult<i32> {
        let trip = self.get_trip(trip_id).await?;
        let recounted = SeatLedger::recount(&self.db, trip_id).await?;

        if recounted != trip.seats_committed {
            tracing::warn!(
                %trip_id,
                materialized = trip.seats_committed,
                recounted,
                "Seat inventory diverged from booking rows"
            );
        }
        Ok(recounted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::Harness;
    use proptest::prelude::*;
    use sea_orm::TransactionTrait;

    #[tokio::test]
    async fn test_reserve_rejects_out_of_range_requests() {
        let h = Harness::new().await;
        let trip = h.trip(3).await;

        let txn = h.engine.db().begin().await.unwrap();
        let mut locked = trip.clone();
        for seats in [0, -1, 4] {
            let err = SeatLedger::reserve(&txn, &mut locked, Uuid::new_v4(), seats)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidRequest(_)), "seats={seats}");
        }
        assert_eq!(locked.seats_committed, 0);
    }

    #[tokio::test]
    async fn test_reserve_and_release_update_counter() {
        let h = Harness::new().await;
        let trip = h.trip(4).await;

        let txn = h.engine.db().begin().await.unwrap();
        let mut locked = trip.clone();
        let reservation = SeatLedger::reserve(&txn, &mut locked, Uuid::new_v4(), 3)
            .await
            .unwrap();
        assert_eq!(reservation.seats_remaining, 1);

        let err = SeatLedger::reserve(&txn, &mut locked, Uuid::new_v4(), 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::CapacityExceeded {
                requested: 2,
                available: 1
            }
        ));
        txn.commit().await.unwrap();

        assert_eq!(h.engine.available_seats(trip.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_release_of_cancelled_booking_is_noop() {
        let h = Harness::new().await;
        let trip = h.trip(4).await;
        let passenger = h.passenger().await;
        let booking = h.engine.book_trip(trip.id, passenger, 2).await.unwrap();
        let caller = h.passenger_caller(passenger);

        h.engine.cancel_booking(booking.id, &caller).await.unwrap();
        let cancelled = h.engine.get_booking(booking.id).await.unwrap();

        let mut locked = h.engine.get_trip(trip.id).await.unwrap();
        let txn = h.engine.db().begin().await.unwrap();
        let released = SeatLedger::release(&txn, &mut locked, &cancelled)
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert!(!released);
        assert_eq!(h.engine.available_seats(trip.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_reserve_rejects_non_upcoming_trip() {
        let h = Harness::new().await;
        let trip = h.trip(4).await;
        h.engine
            .transition_trip(trip.id, TripStatus::Cancelled, &h.admin, None)
            .await
            .unwrap();

        let mut locked = h.engine.get_trip(trip.id).await.unwrap();
        let txn = h.engine.db().begin().await.unwrap();
        let err = SeatLedger::reserve(&txn, &mut locked, Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TripNotBookable(TripStatus::Cancelled)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        /// Concurrent requests never oversell, and a request is only turned away
        /// when it could not fit.
        #[test]
        fn prop_concurrent_bookings_never_exceed_capacity(
            capacity in 1i32..12,
            requests in proptest::collection::vec(1i32..4, 1..16),
        ) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async move {
                let h = Harness::new().await;
                let trip_id = h.trip(capacity).await.id;

                let mut handles = Vec::new();
                for seats in requests.iter().copied() {
                    let engine = h.engine.clone();
                    let passenger = h.passenger().await;
                    handles.push(tokio::spawn(async move {
                        (seats, engine.book_trip(trip_id, passenger, seats).await)
                    }));
                }

                let mut granted = 0;
                for handle in handles {
                    let (seats, result) = handle.await.unwrap();
                    match result {
                        Ok(booking) => {
                            assert_eq!(booking.status, BookingStatus::Confirmed);
                            granted += seats;
                        }
                        Err(AppError::CapacityExceeded { .. } | AppError::InvalidRequest(_)) => {}
                        Err(other) => panic!("unexpected rejection: {other:?}"),
                    }
                }

                assert!(granted <= capacity);
                assert_eq!(h.engine.available_seats(trip_id).await.unwrap(), capacity - granted);
                assert_eq!(h.engine.verify_inventory(trip_id).await.unwrap(), granted);

                // Availability only shrinks here, so anything rejected is still too big.
                let remaining = capacity - granted;
                let rejected = h
                    .engine
                    .list_trip_bookings(trip_id)
                    .await
                    .unwrap()
                    .into_iter()
                    .filter(|b| b.status == BookingStatus::Cancelled)
                    .collect::<Vec<_>>();
                assert!(rejected.iter().all(|b| b.seats_booked > remaining));
            });
        }
    }
}
