pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_users_table;
mod m20250601_000002_create_teams_table;
mod m20250601_000003_create_team_memberships_table;
mod m20250601_000004_create_models_table;
mod m20250601_000005_create_model_grants_table;
mod m20250601_000006_create_api_keys_table;
mod m20250601_000007_create_usage_metrics_table;
mod m20250601_000008_create_audit_events_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_users_table::Migration),
            Box::new(m20250601_000002_create_teams_table::Migration),
            Box::new(m20250601_000003_create_team_memberships_table::Migration),
            Box::new(m20250601_000004_create_models_table::Migration),
            Box::new(m20250601_000005_create_model_grants_table::Migration),
            Box::new(m20250601_000006_create_api_keys_table::Migration),
            Box::new(m20250601_000007_create_usage_metrics_table::Migration),
            Box::new(m20250601_000008_create_audit_events_table::Migration),
        ]
    }
}
