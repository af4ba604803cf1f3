//! # 团队（租户）实体定义
//!
//! 团队是计费与限流边界。`ext_id` 是对外的稳定句柄，在URL、
//! 限流策略文档和 groups 声明中与内部 `id` 互换使用。
//! `rate_limit_spec` 由标量字段在写入时派生，标量为准。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 团队实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "teams")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub ext_id: String,
    #[sea_orm(unique)]
    pub name: String,
    pub description: String,
    pub rate_limit: i32,
    pub rate_window: String,
    #[sea_orm(column_type = "Json")]
    pub rate_limit_spec: Json,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::team_memberships::Entity")]
    TeamMemberships,
    #[sea_orm(has_many = "super::api_keys::Entity")]
    ApiKeys,
    #[sea_orm(has_many = "super::model_grants::Entity")]
    ModelGrants,
}

impl Related<super::team_memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeamMemberships.def()
    }
}

impl Related<super::api_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKeys.def()
    }
}

impl Related<super::model_grants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelGrants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
