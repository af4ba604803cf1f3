//! # 数据库模块
//!
//! 数据库连接和迁移管理

use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, DbErr};

use crate::linfo;
use crate::logging::{LogComponent, LogStage};

/// 初始化数据库连接
pub async fn init_database(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "connected",
        "Database connection established"
    );
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    migration::Migrator::up(db, None).await?;
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "migrated",
        "Database migrations applied"
    );
    Ok(())
}
