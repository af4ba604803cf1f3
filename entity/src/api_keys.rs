//! # API密钥实体定义
//!
//! 仅持久化前缀、哈希与盐，明文只在签发时返回一次。
//! `user_id` 为空表示团队服务密钥；删除用户时置空以保留审计线索。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 密钥状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "revoked")]
    Revoked,
    #[sea_orm(string_value = "suspended")]
    Suspended,
}

/// API密钥实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// 明文前8字符，全局唯一，作为快速查找索引
    #[sea_orm(unique)]
    pub key_prefix: String,
    pub key_hash: String,
    /// 哈希算法名，校验逻辑按此分派（plaintext / argon2id）
    pub hash_alg: String,
    /// 16字节随机盐，hex编码存储
    pub salt: String,
    pub team_id: Uuid,
    pub user_id: Option<Uuid>,
    pub alias: String,
    pub status: KeyStatus,
    pub expires_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub last_used_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teams::Entity",
        from = "Column::TeamId",
        to = "super::teams::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Team,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    User,
}

impl Related<super::teams::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Team.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
