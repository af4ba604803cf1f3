//! # 用户存储操作

use chrono::Utc;
use entity::users::{self, UserKind};
use entity::Users;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use super::{map_unique_violation, Store};
use crate::error::Result;

impl Store {
    /// 创建用户；`external_id` 与邮箱唯一冲突映射为 409
    pub async fn create_user(
        &self,
        external_id: &str,
        email: Option<&str>,
        display_name: &str,
        kind: UserKind,
    ) -> Result<users::Model> {
        let now = Utc::now();
        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            external_id: Set(external_id.to_string()),
            email: Set(email.map(|e| e.trim().to_lowercase())),
            display_name: Set(display_name.to_string()),
            kind: Set(kind),
            created_at: Set(now),
            updated_at: Set(now),
        };

        user.insert(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "User", external_id))
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<users::Model>> {
        Ok(Users::find_by_id(user_id).one(&self.db).await?)
    }

    pub async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<users::Model>> {
        Ok(Users::find()
            .filter(users::Column::ExternalId.eq(external_id))
            .one(&self.db)
            .await?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        Ok(Users::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await?)
    }

    /// 解析用户引用：先按内部id，失败再按身份提供方external_id
    pub async fn resolve_user_ref(&self, user_ref: &str) -> Result<Option<users::Model>> {
        if let Ok(id) = Uuid::parse_str(user_ref) {
            if let Some(user) = self.get_user(id).await? {
                return Ok(Some(user));
            }
        }
        self.find_user_by_external_id(user_ref).await
    }

    /// 按 external_id 查找用户，不存在则创建（自助引导路径）
    pub async fn ensure_user(
        &self,
        external_id: &str,
        email: Option<&str>,
    ) -> Result<users::Model> {
        if let Some(user) = self.find_user_by_external_id(external_id).await? {
            return Ok(user);
        }
        let display_name = email.unwrap_or(external_id);
        self.create_user(external_id, email, display_name, UserKind::Human)
            .await
    }
}
