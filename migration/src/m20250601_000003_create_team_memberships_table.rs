use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TeamMemberships::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TeamMemberships::TeamId).uuid().not_null())
                    .col(ColumnDef::new(TeamMemberships::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(TeamMemberships::Role)
                            .string_len(16)
                            .not_null()
                            .default("member"),
                    )
                    .col(
                        ColumnDef::new(TeamMemberships::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(TeamMemberships::TeamId)
                            .col(TeamMemberships::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_memberships_team_id")
                            .from(TeamMemberships::Table, TeamMemberships::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_memberships_user_id")
                            .from(TeamMemberships::Table, TeamMemberships::UserId)
                            .to(Users::Table, Users::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_team_memberships_user_id")
                    .table(TeamMemberships::Table)
                    .col(TeamMemberships::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TeamMemberships::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TeamMemberships {
    Table,
    TeamId,
    UserId,
    Role,
    JoinedAt,
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
