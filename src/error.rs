use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;

use crate::entities::trip::TripStatus;

pub type AppResult<T> = Result<T, AppError>;

/// Every rejection the engine can report. Business-rule variants are final
/// answers; only `TransientFailure` is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Requested {requested} seats but only {available} available")]
    CapacityExceeded { requested: i32, available: i32 },

    #[error("Trip is {0:?} and no longer accepts bookings")]
    TripNotBookable(TripStatus),

    #[error("User already holds an active booking on this trip")]
    AlreadyBooked,

    #[error("Trip is {0:?} and can no longer be edited")]
    TripLocked(TripStatus),

    #[error("Cannot cancel a booking on a completed trip")]
    TripAlreadyCompleted,

    #[error("Trip has already reached a terminal state ({0:?})")]
    AlreadyCompleted(TripStatus),

    #[error("Trip has not reached its departure time")]
    NotYetDeparted,

    #[error("Trip has not reached its arrival time")]
    TripStillInProgress,

    #[error("Cannot move trip from {from:?} to {to:?}")]
    InvalidTransition { from: TripStatus, to: TripStatus },

    #[error("Trip must be completed before it can be rated")]
    TripNotCompleted,

    #[error("Only passengers with a confirmed booking may rate this trip")]
    RaterNotParticipant,

    #[error("Trip was already rated by this passenger")]
    DuplicateRating,

    #[error("Score {0} is outside 1..=5")]
    InvalidScore(i32),

    #[error("At least one score is required")]
    EmptyRating,

    #[error("Storage unavailable: {0}")]
    TransientFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::CapacityExceeded { .. } => "CapacityExceeded",
            AppError::TripNotBookable(_) => "TripNotBookable",
            AppError::AlreadyBooked => "AlreadyBooked",
            AppError::TripLocked(_) => "TripLocked",
            AppError::TripAlreadyCompleted => "TripAlreadyCompleted",
            AppError::AlreadyCompleted(_) => "AlreadyCompleted",
            AppError::NotYetDeparted => "NotYetDeparted",
            AppError::TripStillInProgress => "TripStillInProgress",
            AppError::InvalidTransition { .. } => "InvalidTransition",
            AppError::TripNotCompleted => "TripNotCompleted",
            AppError::RaterNotParticipant => "RaterNotParticipant",
            AppError::DuplicateRating => "DuplicateRating",
            AppError::InvalidScore(_) => "InvalidScore",
            AppError::EmptyRating => "EmptyRating",
            AppError::TransientFailure(_) => "TransientFailure",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::InvalidScore(_) | AppError::EmptyRating => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::RaterNotParticipant => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TransientFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::CONFLICT,
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::TransientFailure(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::TransientFailure(msg) => {
                tracing::error!(error = %msg, "Persistence failure");
                "Temporarily unavailable, please retry".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rejections_map_to_conflict() {
        let err = AppError::CapacityExceeded {
            requested: 3,
            available: 1,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "CapacityExceeded");
        assert_eq!(
            AppError::AlreadyCompleted(TripStatus::Cancelled).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_db_errors_are_transient() {
        let err: AppError = DbErr::Custom("connection reset".to_string()).into();
        assert_eq!(err.code(), "TransientFailure");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_errors_are_bad_request() {
        assert_eq!(AppError::InvalidScore(9).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::EmptyRating.status_code(), StatusCode::BAD_REQUEST);
    }
}
