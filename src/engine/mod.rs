//! Trip booking and rating engine.
//!
//! All mutating operations follow the same shape: resolve directory lookups first,
//! take the keyed lock(s) for the affected entities, run one database transaction
//! with the trip row locked, commit, then call out to the notifier and audit sink.
//! Locks are never held across collaborator calls and transactions are never
//! opened before the locks are taken.

pub mod bookings;
pub mod catalog;
pub mod clock;
pub mod ledger;
pub mod locks;
pub mod ratings;
pub mod trips;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, QuerySelect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::trip::{self, CancelledBy};
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::services::{AuditEntry, AuditSink, Directory, Notifier};

pub use catalog::{NewTrip, TripPatch};
pub use clock::{Clock, SystemClock};
pub use ledger::{Reservation, SeatLedger};
pub use locks::KeyedLocks;
pub use ratings::{RatingScores, RatingSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerRole {
    Admin,
    Driver,
    Passenger,
    /// Schedulers and other in-process automation.
    System,
}

impl From<UserRole> for CallerRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => CallerRole::Admin,
            UserRole::Driver => CallerRole::Driver,
            UserRole::Passenger => CallerRole::Passenger,
        }
    }
}

impl CallerRole {
    pub fn cancelled_by(self) -> Option<CancelledBy> {
        match self {
            CallerRole::Admin => Some(CancelledBy::Admin),
            CallerRole::Driver => Some(CancelledBy::Driver),
            CallerRole::System => Some(CancelledBy::System),
            CallerRole::Passenger => None,
        }
    }
}

/// The authenticated identity on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: CallerRole,
}

impl Caller {
    pub fn new(id: Uuid, role: CallerRole) -> Self {
        Self { id, role }
    }

    pub fn system() -> Self {
        Self {
            id: Uuid::nil(),
            role: CallerRole::System,
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    db: DatabaseConnection,
    locks: KeyedLocks,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
}

impl Engine {
    pub fn new(
        db: DatabaseConnection,
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
            clock: Arc::new(SystemClock),
            directory,
            notifier,
            audit,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Admin callers are re-checked against the directory; system callers are trusted.
    async fn require_admin(&self, caller: &Caller) -> AppResult<()> {
        let allowed = match caller.role {
            CallerRole::System => true,
            CallerRole::Admin => self.directory.is_admin(caller.id).await?,
            CallerRole::Driver | CallerRole::Passenger => false,
        };

        if !allowed {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(())
    }

    /// Admins, system callers, or the driver assigned to the trip. Returns the
    /// trip as read before authorization, so unknown trips are `NotFound`.
    async fn require_trip_operator(&self, caller: &Caller, trip_id: Uuid) -> AppResult<trip::Model> {
        let trip = self.get_trip(trip_id).await?;

        match caller.role {
            CallerRole::Admin | CallerRole::System => self.require_admin(caller).await?,
            CallerRole::Driver => {
                if !self.directory.is_driver_of(trip_id, caller.id).await? {
                    return Err(AppError::Forbidden(
                        "You are not assigned to this trip".to_string(),
                    ));
                }
            }
            CallerRole::Passenger => {
                return Err(AppError::Forbidden(
                    "Passengers cannot operate trips".to_string(),
                ));
            }
        }
        Ok(trip)
    }

    /// Audit failures never undo a committed change.
    async fn record_audit(&self, entry: AuditEntry) {
        let entity_id = entry.entity_id;
        let action = entry.action.as_str();
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(%entity_id, action, error = %e, "Failed to record audit entry");
        }
    }

    async fn notify_passengers(&self, trip_id: Uuid, passengers: &[Uuid], reason: &str) {
        for user_id in passengers {
            if let Err(e) = self.notifier.notify(*user_id, trip_id, reason).await {
                tracing::warn!(%trip_id, %user_id, error = %e, "Failed to notify passenger");
            }
        }
    }
}

/// Loads a trip with an exclusive row lock (a no-op on SQLite, which serializes writers).
async fn lock_trip<C: ConnectionTrait>(conn: &C, trip_id: Uuid) -> AppResult<trip::Model> {
    trip::Entity::find_by_id(trip_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))
}
