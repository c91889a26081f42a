use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoredRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoredRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StoredRequests::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoredRequests::Response)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoredRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Concurrent first-time submissions race on this index; the loser gets a
        // unique violation instead of a second row.
        manager
            .create_index(
                Index::create()
                    .table(StoredRequests::Table)
                    .col(StoredRequests::IdempotencyKey)
                    .name("uq_stored_requests_idempotency_key")
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoredRequests::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StoredRequests {
    Table,
    Id,
    IdempotencyKey,
    Response,
    CreatedAt,
}
