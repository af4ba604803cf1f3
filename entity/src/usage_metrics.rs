//! # 用量样本实体定义
//!
//! 从时序后端抓取的用量汇总落库表，仅追加。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用量样本实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_metrics")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub namespace: String,
    pub metric: String,
    #[sea_orm(column_type = "Double")]
    pub value: f64,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
