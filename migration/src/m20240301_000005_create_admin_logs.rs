use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // actor_id has no foreign key: system-triggered actions use the nil uuid
        manager
            .create_table(
                Table::create()
                    .table(AdminLog::Table)
                    .if_not_exists()
                    .col(uuid(AdminLog::Id).primary_key())
                    .col(uuid(AdminLog::ActorId).not_null())
                    .col(string_len(AdminLog::ActionType, 50).not_null())
                    .col(string_len(AdminLog::EntityType, 50).not_null())
                    .col(uuid(AdminLog::EntityId).not_null())
                    .col(text(AdminLog::Description).not_null())
                    .col(
                        timestamp_with_time_zone(AdminLog::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AdminLog::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AdminLog {
    Table,
    Id,
    ActorId,
    ActionType,
    EntityType,
    EntityId,
    Description,
    CreatedAt,
}
