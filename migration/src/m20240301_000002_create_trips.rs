use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_directory::{Driver, Vehicle};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Trip::Table)
                    .if_not_exists()
                    .col(uuid(Trip::Id).primary_key())
                    .col(uuid(Trip::DriverId).not_null())
                    .col(uuid(Trip::VehicleId).not_null())
                    .col(string_len(Trip::TripName, 100).not_null())
                    .col(string_len(Trip::StartLocation, 255).not_null())
                    .col(string_len(Trip::EndLocation, 255).not_null())
                    .col(timestamp_with_time_zone(Trip::DepartureTime).not_null())
                    .col(timestamp_with_time_zone(Trip::ArrivalTime).not_null())
                    .col(big_integer(Trip::PriceCents).not_null())
                    .col(integer(Trip::Capacity).not_null())
                    .col(integer(Trip::SeatsCommitted).not_null().default(0))
                    // upcoming | ongoing | completed | cancelled
                    .col(string_len(Trip::Status, 20).not_null())
                    .col(string_len_null(Trip::CancelledBy, 20))
                    .col(text_null(Trip::CancellationReason))
                    .col(
                        timestamp_with_time_zone(Trip::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Trip::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trip_driver")
                            .from(Trip::Table, Trip::DriverId)
                            .to(Driver::Table, Driver::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trip_vehicle")
                            .from(Trip::Table, Trip::VehicleId)
                            .to(Vehicle::Table, Vehicle::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_trip_status")
                    .table(Trip::Table)
                    .col(Trip::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Trip::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Trip {
    Table,
    Id,
    DriverId,
    VehicleId,
    TripName,
    StartLocation,
    EndLocation,
    DepartureTime,
    ArrivalTime,
    PriceCents,
    Capacity,
    SeatsCommitted,
    Status,
    CancelledBy,
    CancellationReason,
    CreatedAt,
    UpdatedAt,
}
