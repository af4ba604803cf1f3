//! # 存储层
//!
//! 数据模型之上的事务性仓库。多步写操作（密钥创建、团队级联删除、
//! 授权创建时的模型隐式补建）都在单个事务内完成；唯一约束冲突
//! 映射为 `Conflict`，缺失记录映射为 `NotFound`，供HTTP层翻译为
//! 409 / 404。

mod api_keys;
mod audit;
mod grants;
mod memberships;
mod models;
mod teams;
mod usage_metrics;
mod users;

pub use api_keys::DeletedKey;
pub use teams::{DeletedTeam, NewTeam, TeamPatch};

use sea_orm::{DatabaseConnection, DbErr, SqlErr};

use crate::error::MaasError;

/// 仓库入口，持有唯一的共享连接池
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 暴露底层连接，供迁移与健康检查使用
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// 把唯一约束冲突翻译为带资源语义的冲突错误
fn map_unique_violation(err: DbErr, resource_type: &str, identifier: &str) -> MaasError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            MaasError::conflict(resource_type, identifier)
        }
        _ => MaasError::from(err),
    }
}
