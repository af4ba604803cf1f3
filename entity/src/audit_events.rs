//! # 审计事件实体定义
//!
//! 控制面变更操作的尽力而为审计记录。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 审计事件实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// 操作者（PEP注入的主体标识）
    pub actor: String,
    pub action: String,
    pub resource: String,
    #[sea_orm(column_type = "Json")]
    pub detail: Json,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
