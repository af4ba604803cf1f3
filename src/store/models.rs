//! # 模型目录存储操作

use chrono::Utc;
use entity::models::{self, ModelStatus};
use entity::Models;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set};
use serde_json::json;
use uuid::Uuid;

use super::Store;
use crate::error::Result;

impl Store {
    /// 已发布模型目录
    pub async fn list_published_models(&self) -> Result<Vec<models::Model>> {
        Ok(Models::find()
            .filter(models::Column::Status.eq(ModelStatus::Published))
            .order_by_asc(models::Column::Name)
            .all(&self.db)
            .await?)
    }

    /// 按名称查找模型，缺失则以占位元数据补建（授权路径隐式建模）
    pub(crate) async fn upsert_model_by_name<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
    ) -> Result<models::Model> {
        if let Some(model) = Models::find()
            .filter(models::Column::Name.eq(name))
            .one(conn)
            .await?
        {
            return Ok(model);
        }

        let now = Utc::now();
        let model = models::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            provider: Set("local".to_string()),
            route_name: Set(name.to_string()),
            status: Set(ModelStatus::Published),
            pricing: Set(json!({})),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(conn).await?)
    }
}
