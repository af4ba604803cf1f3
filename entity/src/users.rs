//! # 用户实体定义
//!
//! 用户基础信息表的 Sea-ORM 实体模型。`external_id` 是身份提供方
//! 断言的稳定主体标识，写入后不可变更。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    #[sea_orm(string_value = "human")]
    Human,
    #[sea_orm(string_value = "service")]
    Service,
}

/// 用户实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub external_id: String,
    /// 邮箱统一小写存储，可空但唯一
    #[sea_orm(unique)]
    pub email: Option<String>,
    pub display_name: String,
    pub kind: UserKind,
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
