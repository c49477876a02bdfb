use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct OutboxEventsMigration;

#[async_trait::async_trait]
impl MigrationTrait for OutboxEventsMigration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OutboxEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OutboxEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OutboxEvents::EventType)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboxEvents::Payload).json_binary().not_null())
                    .col(ColumnDef::new(OutboxEvents::Status).string_len(32).not_null())
                    .col(
                        ColumnDef::new(OutboxEvents::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(OutboxEvents::LastError).string_len(2048))
                    .col(ColumnDef::new(OutboxEvents::NextAttemptAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OutboxEvents::LockedBy).string_len(128))
                    .col(ColumnDef::new(OutboxEvents::LockedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(OutboxEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboxEvents::DispatchedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // The relay's due scan filters on (status, next_attempt_at)...
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_outbox_events_due")
                    .table(OutboxEvents::Table)
                    .col(OutboxEvents::Status)
                    .col(OutboxEvents::NextAttemptAt)
                    .to_owned(),
            )
            .await?;

        // ...and the lease CAS plus stale-lease reclamation filter on
        // locked_at.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_outbox_events_locked_at")
                    .table(OutboxEvents::Table)
                    .col(OutboxEvents::LockedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OutboxEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OutboxEvents {
    Table,
    Id,
    EventType,
    Payload,
    Status,
    Attempts,
    LastError,
    NextAttemptAt,
    LockedBy,
    LockedAt,
    CreatedAt,
    DispatchedAt,
}
