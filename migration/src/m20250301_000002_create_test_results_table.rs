use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TestResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestResults::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TestResults::TestId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestResults::KeyHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestResults::KeyMasked)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestResults::Provider)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestResults::Model)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestResults::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TestResults::Error).text())
                    .col(
                        ColumnDef::new(TestResults::IsRateLimit)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TestResults::IsPaid).boolean())
                    .col(
                        ColumnDef::new(TestResults::TestedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_test_results_test_id")
                            .from(TestResults::Table, TestResults::TestId)
                            .to(TestSessions::Table, TestSessions::TestId)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 结果查询按 test_id 过滤、按状态筛选
        manager
            .create_index(
                Index::create()
                    .name("idx_test_results_test_id")
                    .table(TestResults::Table)
                    .col(TestResults::TestId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_test_results_test_id_status")
                    .table(TestResults::Table)
                    .col(TestResults::TestId)
                    .col(TestResults::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_test_results_key_hash")
                    .table(TestResults::Table)
                    .col(TestResults::KeyHash)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TestResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TestResults {
    Table,
    Id,
    TestId,
    KeyHash,
    KeyMasked,
    Provider,
    Model,
    Status,
    Error,
    IsRateLimit,
    IsPaid,
    TestedAt,
}

#[derive(DeriveIden)]
enum TestSessions {
    Table,
    TestId,
}
