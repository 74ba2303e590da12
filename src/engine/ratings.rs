//! Post-trip ratings and the running driver/vehicle averages.
//!
//! Averages are kept as an `(average, count)` pair and folded incrementally, so a
//! new score never requires rescanning earlier ratings. The rating row and both
//! aggregate updates commit together.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{lock_trip, Engine};
use crate::entities::booking::{self, BookingStatus};
use crate::entities::trip::TripStatus;
use crate::entities::{driver, rating, vehicle};
use crate::error::{AppError, AppResult};

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatingScores {
    pub user_score: Option<i32>,
    pub driver_score: Option<i32>,
    pub vehicle_score: Option<i32>,
    pub comments: Option<String>,
}

impl RatingScores {
    pub fn validate(&self) -> AppResult<()> {
        let scores = [self.user_score, self.driver_score, self.vehicle_score];
        if scores.iter().all(Option::is_none) {
            return Err(AppError::EmptyRating);
        }

        for score in scores.into_iter().flatten() {
            if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
                return Err(AppError::InvalidScore(score));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub id: Uuid,
    pub average_rating: f64,
    pub rating_count: i32,
}

/// Folds one score into a running mean.
pub fn fold_mean(average: f64, count: i32, score: i32) -> (f64, i32) {
    let count = count + 1;
    let average = average + (f64::from(score) - average) / f64::from(count);
    (average, count)
}

fn map_insert_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateRating,
        _ => err.into(),
    }
}

impl Engine {
    pub async fn submit_rating(
        &self,
        trip_id: Uuid,
        rater_id: Uuid,
        scores: RatingScores,
    ) -> AppResult<rating::Model> {
        scores.validate()?;

        let trip = self.get_trip(trip_id).await?;
        let _guards = self
            .locks
            .lock_many([trip_id, trip.driver_id, trip.vehicle_id])
            .await;

        let txn = self.db.begin().await?;
        let trip = lock_trip(&txn, trip_id).await?;

        if trip.status != TripStatus::Completed {
            return Err(AppError::TripNotCompleted);
        }

        let confirmed = booking::Entity::find()
            .filter(booking::Column::TripId.eq(trip_id))
            .filter(booking::Column::UserId.eq(rater_id))
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed))
            .count(&txn)
            .await?;
        if confirmed == 0 {
            return Err(AppError::RaterNotParticipant);
        }

        let existing = rating::Entity::find()
            .filter(rating::Column::TripId.eq(trip_id))
            .filter(rating::Column::RaterId.eq(rater_id))
            .count(&txn)
            .await?;
        if existing > 0 {
            return Err(AppError::DuplicateRating);
        }

        let saved = rating::ActiveModel {
            id: Set(Uuid::new_v4()),
            trip_id: Set(trip_id),
            rater_id: Set(rater_id),
            driver_id: Set(scores.driver_score.map(|_| trip.driver_id)),
            vehicle_id: Set(scores.vehicle_score.map(|_| trip.vehicle_id)),
            user_rating: Set(scores.user_score),
            driver_rating: Set(scores.driver_score),
            vehicle_rating: Set(scores.vehicle_score),
            comments: Set(scores.comments.filter(|c| !c.trim().is_empty())),
            created_at: Set(self.clock.now().into()),
        }
        .insert(&txn)
        .await
        .map_err(map_insert_error)?;

        if let Some(score) = scores.driver_score {
            let driver = driver::Entity::find_by_id(trip.driver_id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;
            let (average, count) = fold_mean(driver.average_rating, driver.rating_count, score);

            let mut active: driver::ActiveModel = driver.into();
            active.average_rating = Set(average);
            active.rating_count = Set(count);
            active.update(&txn).await?;
        }

        if let Some(score) = scores.vehicle_score {
            let vehicle = vehicle::Entity::find_by_id(trip.vehicle_id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;
            let (average, count) = fold_mean(vehicle.average_rating, vehicle.rating_count, score);

            let mut active: vehicle::ActiveModel = vehicle.into();
            active.average_rating = Set(average);
            active.rating_count = Set(count);
            active.update(&txn).await?;
        }

        txn.commit().await?;

        tracing::info!(
            rating_id = %saved.id,
            %trip_id,
            %rater_id,
            driver_score = ?scores.driver_score,
            vehicle_score = ?scores.vehicle_score,
            "Rating recorded"
        );
        Ok(saved)
    }

    pub async fn driver_average(&self, driver_id: Uuid) -> AppResult<RatingSummary> {
        let driver = driver::Entity::find_by_id(driver_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;

        Ok(RatingSummary {
            id: driver.id,
            average_rating: driver.average_rating,
            rating_count: driver.rating_count,
        })
    }

    pub async fn vehicle_average(&self, vehicle_id: Uuid) -> AppResult<RatingSummary> {
        let vehicle = vehicle::Entity::find_by_id(vehicle_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;

        Ok(RatingSummary {
            id: vehicle.id,
            average_rating: vehicle.average_rating,
            rating_count: vehicle.rating_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::Harness;
    use chrono::Duration;
    use proptest::prelude::*;

    fn driver_only(score: i32) -> RatingScores {
        RatingScores {
            driver_score: Some(score),
            ..Default::default()
        }
    }

    /// Books one seat per passenger, then drives the trip to completion.
    async fn completed_trip(h: &Harness, passengers: usize) -> (Uuid, Vec<Uuid>) {
        let trip = h.trip(10).await;
        let mut riders = Vec::new();
        for _ in 0..passengers {
            let passenger = h.passenger().await;
            h.engine.book_trip(trip.id, passenger, 1).await.unwrap();
            riders.push(passenger);
        }

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
        (trip.id, riders)
    }

    #[test]
    fn test_validate_scores() {
        assert!(matches!(
            RatingScores::default().validate(),
            Err(AppError::EmptyRating)
        ));
        assert!(matches!(
            driver_only(0).validate(),
            Err(AppError::InvalidScore(0))
        ));
        let high_vehicle = RatingScores {
            user_score: Some(4),
            vehicle_score: Some(6),
            ..Default::default()
        };
        assert!(matches!(
            high_vehicle.validate(),
            Err(AppError::InvalidScore(6))
        ));
        assert!(driver_only(5).validate().is_ok());
    }

    #[tokio::test]
    async fn test_driver_average_matches_recompute() {
        let h = Harness::new().await;
        let (trip_id, riders) = completed_trip(&h, 3).await;

        for (rider, score) in riders.iter().zip([5, 3, 4]) {
            h.engine
                .submit_rating(trip_id, *rider, driver_only(score))
                .await
                .unwrap();
        }

        let summary = h.engine.driver_average(h.driver_id).await.unwrap();
        assert_eq!(summary.rating_count, 3);
        assert!((summary.average_rating - 4.0).abs() < 1e-9);

        let scores: Vec<i32> = rating::Entity::find()
            .filter(rating::Column::DriverId.eq(h.driver_id))
            .all(h.engine.db())
            .await
            .unwrap()
            .into_iter()
            .filter_map(|r| r.driver_rating)
            .collect();
        let recomputed = scores.iter().sum::<i32>() as f64 / scores.len() as f64;
        assert!((summary.average_rating - recomputed).abs() < 1e-9);

        // No vehicle score was given, so the vehicle aggregate is untouched.
        let vehicle = h.engine.vehicle_average(h.vehicle_id).await.unwrap();
        assert_eq!(vehicle.rating_count, 0);
    }

    #[tokio::test]
    async fn test_rating_requires_completed_trip() {
        let h = Harness::new().await;
        let trip = h.trip(4).await;
        let passenger = h.passenger().await;
        h.engine.book_trip(trip.id, passenger, 1).await.unwrap();

        let err = h
            .engine
            .submit_rating(trip.id, passenger, driver_only(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TripNotCompleted));
    }

    #[tokio::test]
    async fn test_second_rating_is_duplicate() {
        let h = Harness::new().await;
        let (trip_id, riders) = completed_trip(&h, 1).await;

        let scores = RatingScores {
            driver_score: Some(4),
            vehicle_score: Some(3),
            comments: Some("Smooth ride".to_string()),
            ..Default::default()
        };
        let saved = h
            .engine
            .submit_rating(trip_id, riders[0], scores.clone())
            .await
            .unwrap();
        assert_eq!(saved.driver_id, Some(h.driver_id));
        assert_eq!(saved.vehicle_id, Some(h.vehicle_id));

        let err = h
            .engine
            .submit_rating(trip_id, riders[0], scores)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateRating));

        let vehicle = h.engine.vehicle_average(h.vehicle_id).await.unwrap();
        assert_eq!(vehicle.rating_count, 1);
        assert!((vehicle.average_rating - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_only_confirmed_passengers_rate() {
        let h = Harness::new().await;
        let (trip_id, _) = completed_trip(&h, 1).await;
        let outsider = h.passenger().await;

        let err = h
            .engine
            .submit_rating(trip_id, outsider, driver_only(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RaterNotParticipant));
    }

    #[tokio::test]
    async fn test_invalid_scores_never_reach_storage() {
        let h = Harness::new().await;

        // Unknown trip, but validation fails first.
        let err = h
            .engine
            .submit_rating(Uuid::new_v4(), Uuid::new_v4(), driver_only(7))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidScore(7)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_ratings_on_shared_driver_keep_every_score() {
        let h = Harness::new().await;
        let (first_trip, first_riders) = completed_trip(&h, 1).await;
        let (second_trip, second_riders) = completed_trip(&h, 1).await;

        let engine = h.engine.clone();
        let rider = first_riders[0];
        let first = tokio::spawn(async move {
            let scores = RatingScores {
                driver_score: Some(5),
                vehicle_score: Some(4),
                ..Default::default()
            };
            engine.submit_rating(first_trip, rider, scores).await
        });
        let engine = h.engine.clone();
        let rider = second_riders[0];
        let second = tokio::spawn(async move {
            let scores = RatingScores {
                driver_score: Some(2),
                vehicle_score: Some(1),
                ..Default::default()
            };
            engine.submit_rating(second_trip, rider, scores).await
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let stored: Vec<i32> = rating::Entity::find()
            .filter(rating::Column::DriverId.eq(h.driver_id))
            .all(h.engine.db())
            .await
            .unwrap()
            .into_iter()
            .filter_map(|r| r.driver_rating)
            .collect();
        let recomputed = stored.iter().sum::<i32>() as f64 / stored.len() as f64;

        let driver = h.engine.driver_average(h.driver_id).await.unwrap();
        assert_eq!(driver.rating_count, 2);
        assert_eq!(stored.len(), 2);
        assert!((driver.average_rating - recomputed).abs() < 1e-9);
        assert!((driver.average_rating - 3.5).abs() < 1e-9);

        let vehicle = h.engine.vehicle_average(h.vehicle_id).await.unwrap();
        assert_eq!(vehicle.rating_count, 2);
        assert!((vehicle.average_rating - 2.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_fold_mean_matches_full_average(scores in proptest::collection::vec(1i32..=5, 1..64)) {
            let (average, count) = scores
                .iter()
                .fold((0.0, 0), |(avg, n), &s| fold_mean(avg, n, s));

            let expected = scores.iter().sum::<i32>() as f64 / scores.len() as f64;
            prop_assert_eq!(count as usize, scores.len());
            prop_assert!((average - expected).abs() < 1e-9);
        }
    }
}
