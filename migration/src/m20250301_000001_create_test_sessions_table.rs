use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TestSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestSessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TestSessions::TestId)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(TestSessions::Provider)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestSessions::Model)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestSessions::TotalKeys)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestSessions::ValidCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TestSessions::InvalidCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TestSessions::RateLimitedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TestSessions::Status)
                            .string_len(16)
                            .not_null()
                            .default("running"),
                    )
                    .col(
                        ColumnDef::new(TestSessions::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(TestSessions::CompletedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_test_sessions_created_at")
                    .table(TestSessions::Table)
                    .col(TestSessions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TestSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TestSessions {
    Table,
    Id,
    TestId,
    Provider,
    Model,
    TotalKeys,
    ValidCount,
    InvalidCount,
    RateLimitedCount,
    Status,
    CreatedAt,
    CompletedAt,
}
