//! # API密钥存储操作

use chrono::{DateTime, Utc};
use entity::api_keys::{self, KeyStatus};
use entity::ApiKeys;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use uuid::Uuid;

use super::{map_unique_violation, Store};
use crate::error::{MaasError, Result};
use crate::keys::{self, KeyOwner};

/// 密钥删除结果（不含敏感材料）
#[derive(Debug, Clone, Serialize)]
pub struct DeletedKey {
    pub key_id: Uuid,
    pub key_prefix: String,
    pub alias: String,
    pub team_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl Store {
    /// 签发并持久化一把密钥，返回数据库行与仅此一次可见的明文
    pub async fn create_key(
        &self,
        team_id: Uuid,
        owner: KeyOwner,
        alias: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(api_keys::Model, String)> {
        let material = keys::mint();
        let plaintext = material.plaintext.clone();

        let key = api_keys::ActiveModel {
            id: Set(Uuid::new_v4()),
            key_prefix: Set(material.prefix.clone()),
            key_hash: Set(material.hash),
            hash_alg: Set(material.hash_alg),
            salt: Set(material.salt),
            team_id: Set(team_id),
            user_id: Set(owner.user_id()),
            alias: Set(alias.to_string()),
            status: Set(KeyStatus::Active),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
            last_used_at: Set(None),
        };

        let model = key
            .insert(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "API key", &material.prefix))?;

        Ok((model, plaintext))
    }

    /// 用给定明文落库一把种子密钥（启动时的管理员凭证注入）。
    /// 前缀已存在视为已注入过，返回冲突由调用方忽略。
    pub async fn create_key_from_plaintext(
        &self,
        team_id: Uuid,
        owner: KeyOwner,
        plaintext: &str,
        alias: &str,
    ) -> Result<api_keys::Model> {
        let Some(prefix) = plaintext.get(..keys::KEY_PREFIX_LEN) else {
            return Err(MaasError::validation(
                "seed key must be at least 8 characters",
            ));
        };

        let mut salt_bytes = [0u8; 16];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut salt_bytes);

        let key = api_keys::ActiveModel {
            id: Set(Uuid::new_v4()),
            key_prefix: Set(prefix.to_string()),
            key_hash: Set(plaintext.to_string()),
            hash_alg: Set(keys::HASH_ALG_PLAINTEXT.to_string()),
            salt: Set(hex::encode(salt_bytes)),
            team_id: Set(team_id),
            user_id: Set(owner.user_id()),
            alias: Set(alias.to_string()),
            status: Set(KeyStatus::Active),
            expires_at: Set(None),
            created_at: Set(Utc::now()),
            last_used_at: Set(None),
        };

        key.insert(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "API key", prefix))
    }

    /// 内省热路径：按前缀查找
    pub async fn find_key_by_prefix(&self, prefix: &str) -> Result<Option<api_keys::Model>> {
        Ok(ApiKeys::find()
            .filter(api_keys::Column::KeyPrefix.eq(prefix))
            .one(&self.db)
            .await?)
    }

    pub async fn list_team_keys(&self, team_id: Uuid) -> Result<Vec<api_keys::Model>> {
        Ok(ApiKeys::find()
            .filter(api_keys::Column::TeamId.eq(team_id))
            .order_by_desc(api_keys::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// 用户跨团队的全部密钥
    pub async fn list_user_keys(&self, user_id: Uuid) -> Result<Vec<api_keys::Model>> {
        Ok(ApiKeys::find()
            .filter(api_keys::Column::UserId.eq(user_id))
            .order_by_desc(api_keys::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn delete_key_by_prefix(&self, prefix: &str) -> Result<DeletedKey> {
        let key = self
            .find_key_by_prefix(prefix)
            .await?
            .ok_or_else(|| MaasError::not_found("API key", prefix))?;

        let deleted = DeletedKey {
            key_id: key.id,
            key_prefix: key.key_prefix.clone(),
            alias: key.alias.clone(),
            team_id: key.team_id,
            user_id: key.user_id,
        };

        ApiKeys::delete_by_id(key.id).exec(&self.db).await?;
        Ok(deleted)
    }

    pub async fn delete_key_by_id(&self, key_id: Uuid) -> Result<DeletedKey> {
        let key = ApiKeys::find_by_id(key_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MaasError::not_found("API key", key_id.to_string()))?;

        let deleted = DeletedKey {
            key_id: key.id,
            key_prefix: key.key_prefix.clone(),
            alias: key.alias.clone(),
            team_id: key.team_id,
            user_id: key.user_id,
        };

        ApiKeys::delete_by_id(key_id).exec(&self.db).await?;
        Ok(deleted)
    }

    /// 尽力而为地刷新 last_used_at，失败只记日志不影响内省
    pub async fn touch_last_used(&self, key_id: Uuid) -> Result<()> {
        let key = ApiKeys::find_by_id(key_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MaasError::not_found("API key", key_id.to_string()))?;
        let mut active: api_keys::ActiveModel = key.into();
        active.last_used_at = Set(Some(Utc::now()));
        active.update(&self.db).await?;
        Ok(())
    }
}
