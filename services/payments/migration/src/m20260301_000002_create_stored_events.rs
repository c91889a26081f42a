use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoredEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoredEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StoredEvents::Queue).string().not_null())
                    .col(ColumnDef::new(StoredEvents::Kind).string().not_null())
                    .col(
                        ColumnDef::new(StoredEvents::Message)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoredEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoredEvents::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(StoredEvents::ProcessedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Drain query: unprocessed events in creation order.
        manager
            .create_index(
                Index::create()
                    .table(StoredEvents::Table)
                    .col(StoredEvents::Processed)
                    .col(StoredEvents::CreatedAt)
                    .name("idx_stored_events_processed_created_at")
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoredEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StoredEvents {
    Table,
    Id,
    Queue,
    Kind,
    Message,
    CreatedAt,
    Processed,
    ProcessedAt,
}
