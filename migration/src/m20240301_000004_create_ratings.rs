use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_directory::User;
use super::m20240301_000002_create_trips::Trip;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rating::Table)
                    .if_not_exists()
                    .col(uuid(Rating::Id).primary_key())
                    .col(uuid(Rating::TripId).not_null())
                    .col(uuid(Rating::RaterId).not_null())
                    .col(uuid_null(Rating::DriverId))
                    .col(uuid_null(Rating::VehicleId))
                    .col(integer_null(Rating::UserRating))
                    .col(integer_null(Rating::DriverRating))
                    .col(integer_null(Rating::VehicleRating))
                    .col(text_null(Rating::Comments))
                    .col(
                        timestamp_with_time_zone(Rating::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_trip")
                            .from(Rating::Table, Rating::TripId)
                            .to(Trip::Table, Trip::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rating_rater")
                            .from(Rating::Table, Rating::RaterId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One rating per passenger per trip
        manager
            .create_index(
                Index::create()
                    .name("idx_rating_trip_rater")
                    .table(Rating::Table)
                    .col(Rating::TripId)
                    .col(Rating::RaterId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rating::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Rating {
    Table,
    Id,
    TripId,
    RaterId,
    DriverId,
    VehicleId,
    UserRating,
    DriverRating,
    VehicleRating,
    Comments,
    CreatedAt,
}
