pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_directory;
mod m20240301_000002_create_trips;
mod m20240301_000003_create_bookings;
mod m20240301_000004_create_ratings;
mod m20240301_000005_create_admin_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_directory::Migration),
            Box::new(m20240301_000002_create_trips::Migration),
            Box::new(m20240301_000003_create_bookings::Migration),
            Box::new(m20240301_000004_create_ratings::Migration),
            Box::new(m20240301_000005_create_admin_logs::Migration),
        ]
    }
}
