//! # 模型授权存储操作

use entity::model_grants;
use entity::models::{self, ModelStatus};
use entity::{ModelGrants, Models};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{map_unique_violation, Store};
use crate::error::{MaasError, Result};

impl Store {
    /// 创建模型授权；模型按名称隐式补建，整个操作在一个事务内。
    /// `user_id` 为空表示团队级授权。
    pub async fn create_grant(
        &self,
        team_id: Uuid,
        user_id: Option<Uuid>,
        model_name: &str,
        role: &str,
    ) -> Result<model_grants::Model> {
        crate::ensure_validation!(!model_name.trim().is_empty(), "model_id must not be empty");

        let txn = self.db.begin().await?;

        let model = self.upsert_model_by_name(&txn, model_name).await?;

        // 空 user 的唯一性无法靠普通唯一索引表达，事务内显式判重
        let mut condition = Condition::all()
            .add(model_grants::Column::TeamId.eq(team_id))
            .add(model_grants::Column::ModelId.eq(model.id));
        condition = match user_id {
            Some(uid) => condition.add(model_grants::Column::UserId.eq(uid)),
            None => condition.add(model_grants::Column::UserId.is_null()),
        };
        let existing = ModelGrants::find().filter(condition).count(&txn).await?;
        if existing > 0 {
            return Err(MaasError::conflict("Model grant", model_name));
        }

        let grant = model_grants::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(team_id),
            user_id: Set(user_id),
            model_id: Set(model.id),
            role: Set(role.to_string()),
        };
        let grant = grant
            .insert(&txn)
            .await
            .map_err(|e| map_unique_violation(e, "Model grant", model_name))?;

        txn.commit().await?;
        Ok(grant)
    }

    /// 用户在团队内可访问的已发布模型名（团队级授权 ∪ 用户级授权）
    pub async fn models_allowed(
        &self,
        team_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Vec<String>> {
        let mut user_cond = Condition::any().add(model_grants::Column::UserId.is_null());
        if let Some(uid) = user_id {
            user_cond = user_cond.add(model_grants::Column::UserId.eq(uid));
        }

        let grants = ModelGrants::find()
            .filter(model_grants::Column::TeamId.eq(team_id))
            .filter(user_cond)
            .all(&self.db)
            .await?;

        if grants.is_empty() {
            return Ok(Vec::new());
        }

        let model_ids: Vec<Uuid> = grants.iter().map(|g| g.model_id).collect();
        let names = Models::find()
            .filter(models::Column::Id.is_in(model_ids))
            .filter(models::Column::Status.eq(ModelStatus::Published))
            .order_by_asc(models::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.name)
            .collect();

        Ok(names)
    }
}
