use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UsageMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageMetrics::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UsageMetrics::Namespace)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageMetrics::Metric)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(UsageMetrics::Value).double().not_null())
                    .col(
                        ColumnDef::new(UsageMetrics::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_metrics_namespace")
                    .table(UsageMetrics::Table)
                    .col(UsageMetrics::Namespace)
                    .col(UsageMetrics::Metric)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageMetrics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UsageMetrics {
    Table,
    Id,
    Namespace,
    Metric,
    Value,
    RecordedAt,
}
