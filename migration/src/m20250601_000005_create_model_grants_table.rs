use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ModelGrants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModelGrants::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ModelGrants::TeamId).uuid().not_null())
                    .col(ColumnDef::new(ModelGrants::UserId).uuid())
                    .col(ColumnDef::new(ModelGrants::ModelId).uuid().not_null())
                    .col(
                        ColumnDef::new(ModelGrants::Role)
                            .string_len(32)
                            .not_null()
                            .default("invoke"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_model_grants_team_id")
                            .from(ModelGrants::Table, ModelGrants::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_model_grants_user_id")
                            .from(ModelGrants::Table, ModelGrants::UserId)
                            .to(Users::Table, Users::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_model_grants_model_id")
                            .from(ModelGrants::Table, ModelGrants::ModelId)
                            .to(Models::Table, Models::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引覆盖 (team, user, model)；空 user 的判重由事务内检查兜底
        manager
            .create_index(
                Index::create()
                    .name("uniq_model_grants_team_user_model")
                    .table(ModelGrants::Table)
                    .col(ModelGrants::TeamId)
                    .col(ModelGrants::UserId)
                    .col(ModelGrants::ModelId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_model_grants_team_id")
                    .table(ModelGrants::Table)
                    .col(ModelGrants::TeamId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ModelGrants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ModelGrants {
    Table,
    Id,
    TeamId,
    UserId,
    ModelId,
    Role,
}

#[derive(DeriveIden)]
enum Teams {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Models {
    Table,
    Id,
}
