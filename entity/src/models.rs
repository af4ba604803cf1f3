//! # 模型目录实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 模型发布状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "hidden")]
    Hidden,
    #[sea_orm(string_value = "retired")]
    Retired,
}

/// 模型实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "models")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub provider: String,
    pub route_name: String,
    pub status: ModelStatus,
    #[sea_orm(column_type = "Json")]
    pub pricing: Json,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::model_grants::Entity")]
    ModelGrants,
}

impl Related<super::model_grants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelGrants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
