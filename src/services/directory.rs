use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::user::UserRole;
use crate::entities::{driver, trip, user, vehicle};
use crate::error::AppResult;

/// Read-only view of the account & directory service.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool>;
    async fn driver_exists(&self, driver_id: Uuid) -> AppResult<bool>;
    async fn vehicle_exists(&self, vehicle_id: Uuid) -> AppResult<bool>;
    async fn is_admin(&self, user_id: Uuid) -> AppResult<bool>;
    /// True when `user_id` is the account behind the driver assigned to `trip_id`.
    async fn is_driver_of(&self, trip_id: Uuid, user_id: Uuid) -> AppResult<bool>;
}

/// Directory backed by the tables the account service writes in the shared database.
#[derive(Clone)]
pub struct DbDirectory {
    db: DatabaseConnection,
}

impl DbDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Directory for DbDirectory {
    async fn user_exists(&self, user_id: Uuid) -> AppResult<bool> {
        let count = user::Entity::find_by_id(user_id).count(&self.db).await?;
        Ok(count > 0)
    }

    async fn driver_exists(&self, driver_id: Uuid) -> AppResult<bool> {
        let count = driver::Entity::find_by_id(driver_id).count(&self.db).await?;
        Ok(count > 0)
    }

    async fn vehicle_exists(&self, vehicle_id: Uuid) -> AppResult<bool> {
        let count = vehicle::Entity::find_by_id(vehicle_id)
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn is_admin(&self, user_id: Uuid) -> AppResult<bool> {
        let user = user::Entity::find_by_id(user_id).one(&self.db).await?;
        Ok(user.is_some_and(|u| u.role == UserRole::Admin))
    }

    async fn is_driver_of(&self, trip_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let Some(trip) = trip::Entity::find_by_id(trip_id).one(&self.db).await? else {
            return Ok(false);
        };

        let count = driver::Entity::find_by_id(trip.driver_id)
            .filter(driver::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }
}
