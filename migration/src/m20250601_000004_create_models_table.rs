use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Models::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Models::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Models::Name)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Models::Provider)
                            .string_len(64)
                            .not_null()
                            .default("local"),
                    )
                    .col(ColumnDef::new(Models::RouteName).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Models::Status)
                            .string_len(16)
                            .not_null()
                            .default("published"),
                    )
                    .col(
                        ColumnDef::new(Models::Pricing)
                            .json()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Models::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Models::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Models::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Models {
    Table,
    Id,
    Name,
    Provider,
    RouteName,
    Status,
    Pricing,
    CreatedAt,
    UpdatedAt,
}
