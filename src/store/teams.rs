//! # 团队存储操作
//!
//! 团队引用统一通过 `resolve_team_ref` 解析：先尝试按内部id，
//! 再回退到 ext_id，避免两条查找路径扩散到各处理器。

use chrono::Utc;
use entity::teams;
use entity::{ApiKeys, Teams};
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::{map_unique_violation, Store};
use crate::error::{MaasError, Result};

/// 新建团队参数
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub ext_id: String,
    pub name: String,
    pub description: String,
    pub rate_limit: i32,
    pub rate_window: String,
}

/// 团队部分更新参数，None 表示保持不变
#[derive(Debug, Clone, Default)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rate_limit: Option<i32>,
    pub rate_window: Option<String>,
}

/// 级联删除结果
#[derive(Debug, Clone, Serialize)]
pub struct DeletedTeam {
    pub team_id: Uuid,
    pub ext_id: String,
    pub name: String,
    pub cascaded_key_count: u64,
}

/// 由标量字段派生限流spec JSON，标量为准
fn derive_rate_limit_spec(rate_limit: i32, rate_window: &str) -> serde_json::Value {
    json!({"rates": [{"limit": rate_limit, "window": rate_window}]})
}

/// ext_id 校验：1-63位小写字母数字与连字符，首尾必须为字母数字
fn is_valid_ext_id(ext_id: &str) -> bool {
    if ext_id.is_empty() || ext_id.len() > 63 {
        return false;
    }
    let bytes = ext_id.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    alnum(bytes[0])
        && alnum(bytes[bytes.len() - 1])
        && bytes.iter().all(|&b| alnum(b) || b == b'-')
}

fn validate_rate(rate_limit: i32, rate_window: &str) -> Result<()> {
    crate::ensure_validation!(rate_limit > 0, "rate_limit must be a positive integer");
    if !crate::config::is_valid_duration(rate_window) {
        return Err(MaasError::validation_field(
            "rate_window must be a duration such as 1m or 24h",
            "rate_window",
        ));
    }
    Ok(())
}

impl Store {
    pub async fn create_team(&self, new: NewTeam) -> Result<teams::Model> {
        validate_rate(new.rate_limit, &new.rate_window)?;
        if !is_valid_ext_id(&new.ext_id) {
            return Err(MaasError::validation_field(
                "ext_id must be 1-63 lowercase alphanumeric characters or hyphens",
                "ext_id",
            ));
        }
        crate::ensure_validation!(!new.name.trim().is_empty(), "name must not be empty");

        let now = Utc::now();
        let team = teams::ActiveModel {
            id: Set(Uuid::new_v4()),
            ext_id: Set(new.ext_id.clone()),
            name: Set(new.name),
            description: Set(new.description),
            rate_limit: Set(new.rate_limit),
            rate_window: Set(new.rate_window.clone()),
            rate_limit_spec: Set(derive_rate_limit_spec(new.rate_limit, &new.rate_window)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        team.insert(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "Team", &new.ext_id))
    }

    pub async fn get_team_by_id(&self, team_id: Uuid) -> Result<Option<teams::Model>> {
        Ok(Teams::find_by_id(team_id).one(&self.db).await?)
    }

    pub async fn get_team_by_ext_id(&self, ext_id: &str) -> Result<Option<teams::Model>> {
        Ok(Teams::find()
            .filter(teams::Column::ExtId.eq(ext_id))
            .one(&self.db)
            .await?)
    }

    /// 解析团队引用：uuid解析成功则按id查找，否则按 ext_id
    pub async fn resolve_team_ref(&self, team_ref: &str) -> Result<teams::Model> {
        let team = if let Ok(id) = Uuid::parse_str(team_ref) {
            self.get_team_by_id(id).await?
        } else {
            self.get_team_by_ext_id(team_ref).await?
        };
        team.ok_or_else(|| MaasError::not_found("Team", team_ref))
    }

    pub async fn list_teams(&self) -> Result<Vec<teams::Model>> {
        Ok(Teams::find()
            .order_by_desc(teams::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// 部分更新；返回更新后的行。限流字段变更会重新派生 spec JSON。
    pub async fn update_team(&self, team_id: Uuid, patch: TeamPatch) -> Result<teams::Model> {
        let team = self
            .get_team_by_id(team_id)
            .await?
            .ok_or_else(|| MaasError::not_found("Team", team_id.to_string()))?;

        let rate_limit = patch.rate_limit.unwrap_or(team.rate_limit);
        let rate_window = patch
            .rate_window
            .clone()
            .unwrap_or_else(|| team.rate_window.clone());
        validate_rate(rate_limit, &rate_window)?;

        let name_for_conflict = patch.name.clone().unwrap_or_else(|| team.name.clone());
        let rate_changed = rate_limit != team.rate_limit || rate_window != team.rate_window;

        let mut active: teams::ActiveModel = team.into();
        if let Some(name) = patch.name {
            crate::ensure_validation!(!name.trim().is_empty(), "name must not be empty");
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if rate_changed {
            active.rate_limit = Set(rate_limit);
            active.rate_window = Set(rate_window.clone());
            active.rate_limit_spec = Set(derive_rate_limit_spec(rate_limit, &rate_window));
        }
        active.updated_at = Set(Utc::now());

        active
            .update(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, "Team", &name_for_conflict))
    }

    /// 事务内锁定团队行并级联删除，返回准确的级联密钥数。
    /// 成员、授权、密钥由外键级联清理。
    pub async fn delete_team_cascade(&self, team_id: Uuid) -> Result<DeletedTeam> {
        let txn = self.db.begin().await?;

        let mut query = Teams::find_by_id(team_id);
        // SQLite 无 FOR UPDATE，写事务本身持全库锁
        if self.db.get_database_backend() == DbBackend::Postgres {
            query = query.lock(LockType::Update);
        }
        let team = query
            .one(&txn)
            .await?
            .ok_or_else(|| MaasError::not_found("Team", team_id.to_string()))?;

        let cascaded_key_count = ApiKeys::find()
            .filter(entity::api_keys::Column::TeamId.eq(team_id))
            .count(&txn)
            .await?;

        let ext_id = team.ext_id.clone();
        let name = team.name.clone();
        team.delete(&txn).await?;

        txn.commit().await?;

        Ok(DeletedTeam {
            team_id,
            ext_id,
            name,
            cascaded_key_count,
        })
    }
}
