use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use uuid::Uuid;

use super::{Caller, CallerRole, Clock, Engine, NewTrip};
use crate::entities::user::UserRole;
use crate::entities::{driver, trip, user, vehicle};
use crate::error::AppResult;
use crate::services::{AuditEntry, AuditSink, DbDirectory, Notifier};

/// Fresh in-memory database with every migration applied. A single pooled
/// connection keeps the whole test on one SQLite database.
pub async fn test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Uuid, Uuid, String)>>,
}

impl RecordingNotifier {
    /// `(user_id, trip_id, reason)` in delivery order.
    pub fn sent(&self) -> Vec<(Uuid, Uuid, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: Uuid, trip_id: Uuid, reason: &str) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((user_id, trip_id, reason.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// An engine over a seeded database: one admin, one driver with a vehicle.
pub struct Harness {
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub audit: Arc<RecordingAudit>,
    pub admin: Caller,
    pub driver_user: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
}

impl Harness {
    pub async fn new() -> Self {
        let db = test_db().await;
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let notifier = Arc::new(RecordingNotifier::default());
        let audit = Arc::new(RecordingAudit::default());

        let admin_id = insert_user(&db, UserRole::Admin, clock.now()).await;
        let driver_user = insert_user(&db, UserRole::Driver, clock.now()).await;

        let driver_id = Uuid::new_v4();
        driver::ActiveModel {
            id: Set(driver_id),
            user_id: Set(driver_user),
            license_number: Set(format!("LIC-{}", driver_id.simple())),
            average_rating: Set(0.0),
            rating_count: Set(0),
            total_trips: Set(0),
            created_at: Set(clock.now().into()),
        }
        .insert(&db)
        .await
        .unwrap();

        let vehicle_id = Uuid::new_v4();
        vehicle::ActiveModel {
            id: Set(vehicle_id),
            plate_number: Set(format!("PL-{}", vehicle_id.simple())),
            capacity: Set(40),
            average_rating: Set(0.0),
            rating_count: Set(0),
            created_at: Set(clock.now().into()),
        }
        .insert(&db)
        .await
        .unwrap();

        let engine = Engine::new(
            db.clone(),
            Arc::new(DbDirectory::new(db)),
            notifier.clone(),
            audit.clone(),
        )
        .with_clock(clock.clone());

        Self {
            engine,
            clock,
            notifier,
            audit,
            admin: Caller::new(admin_id, CallerRole::Admin),
            driver_user,
            driver_id,
            vehicle_id,
        }
    }

    pub async fn passenger(&self) -> Uuid {
        insert_user(self.engine.db(), UserRole::Passenger, self.clock.now()).await
    }

    pub fn passenger_caller(&self, user_id: Uuid) -> Caller {
        Caller::new(user_id, CallerRole::Passenger)
    }

    pub fn driver_caller(&self) -> Caller {
        Caller::new(self.driver_user, CallerRole::Driver)
    }

    /// Departs in one hour, arrives three hours later.
    pub fn new_trip(&self, capacity: i32) -> NewTrip {
        let departure = self.clock.now() + Duration::hours(1);
        NewTrip {
            driver_id: self.driver_id,
            vehicle_id: self.vehicle_id,
            trip_name: "Coastal Express".to_string(),
            start_location: "Central Depot".to_string(),
            end_location: "Harbour Terminal".to_string(),
            departure_time: departure,
            arrival_time: departure + Duration::hours(3),
            price_cents: 2_500,
            capacity,
        }
    }

    pub async fn trip(&self, capacity: i32) -> trip::Model {
        self.engine
            .create_trip(&self.admin, self.new_trip(capacity))
            .await
            .unwrap()
    }
}

async fn insert_user(db: &DatabaseConnection, role: UserRole, now: DateTime<Utc>) -> Uuid {
    let id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(id),
        email: Set(format!("{}@example.test", id.simple())),
        name: Set(format!("{:?} {}", role, &id.simple().to_string()[..6])),
        role: Set(role),
        created_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
    id
}
