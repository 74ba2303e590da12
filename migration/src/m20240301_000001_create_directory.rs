use sea_orm_migration::{prelude::*, schema::*};

/// Directory tables are owned by the account service; the engine only reads them
/// and maintains the rating aggregates on `driver` and `vehicle`.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(string_len(User::Email, 255).not_null().unique_key())
                    .col(string_len(User::Name, 100).not_null())
                    // admin | driver | passenger
                    .col(string_len(User::Role, 20).not_null())
                    .col(
                        timestamp_with_time_zone(User::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vehicle::Table)
                    .if_not_exists()
                    .col(uuid(Vehicle::Id).primary_key())
                    .col(string_len(Vehicle::PlateNumber, 20).not_null().unique_key())
                    .col(integer(Vehicle::Capacity).not_null())
                    .col(double(Vehicle::AverageRating).not_null().default(0.0))
                    .col(integer(Vehicle::RatingCount).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(Vehicle::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Driver::Table)
                    .if_not_exists()
                    .col(uuid(Driver::Id).primary_key())
                    .col(uuid(Driver::UserId).not_null().unique_key())
                    .col(string_len(Driver::LicenseNumber, 50).not_null().unique_key())
                    .col(double(Driver::AverageRating).not_null().default(0.0))
                    .col(integer(Driver::RatingCount).not_null().default(0))
                    .col(integer(Driver::TotalTrips).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(Driver::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_driver_user")
                            .from(Driver::Table, Driver::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Driver::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vehicle::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum User {
    Table,
    Id,
    Email,
    Name,
    Role,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Driver {
    Table,
    Id,
    UserId,
    LicenseNumber,
    AverageRating,
    RatingCount,
    TotalTrips,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Vehicle {
    Table,
    Id,
    PlateNumber,
    Capacity,
    AverageRating,
    RatingCount,
    CreatedAt,
}
