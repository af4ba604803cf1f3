//! # 密钥管理处理器
//!
//! 明文密钥只出现在签发响应里；列表响应一律只含前缀等非敏感
//! 字段。用户路径段接受字面量 "me"，非管理员只能操作自己的
//! 资源。

use axum::extract::{Extension, Path, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use entity::api_keys;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{MaasError, Result};
use crate::keys::KeyOwner;
use crate::management::middleware::AuthContext;
use crate::management::response;
use crate::management::server::AppState;

use super::audit_event;

/// 团队密钥签发请求；user_id 可为内部id或身份提供方标识，
/// 两者都解析不到时签发团队服务密钥
#[derive(Debug, Deserialize)]
pub struct CreateTeamKeyRequest {
    pub user_id: Option<String>,
    #[serde(default)]
    pub alias: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 用户密钥签发请求
#[derive(Debug, Deserialize)]
pub struct CreateUserKeyRequest {
    pub alias: String,
    pub team_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 签发响应：明文仅此一次
#[derive(Debug, Serialize)]
struct MintedKeyResponse {
    api_key: String,
    key_id: Uuid,
    key_prefix: String,
    team_id: Uuid,
    team_ext_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
    alias: String,
    created_at: DateTime<Utc>,
}

/// 列表项：不含哈希与盐
#[derive(Debug, Serialize)]
struct KeySummary {
    id: Uuid,
    key_prefix: String,
    alias: String,
    status: api_keys::KeyStatus,
    team_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
}

impl From<api_keys::Model> for KeySummary {
    fn from(key: api_keys::Model) -> Self {
        Self {
            id: key.id,
            key_prefix: key.key_prefix,
            alias: key.alias,
            status: key.status,
            team_id: key.team_id,
            user_id: key.user_id,
            expires_at: key.expires_at,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
        }
    }
}

/// 用户密钥列表项，附带团队信息
#[derive(Debug, Serialize)]
struct UserKeyEntry {
    #[serde(flatten)]
    key: KeySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_ext_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_name: Option<String>,
}

/// 解析用户路径段："me" 指向请求者本人（必要时补建），
/// 其余按内部id / 身份提供方标识解析；非管理员禁止指向他人
pub(crate) async fn resolve_target_user(
    state: &AppState,
    auth: &AuthContext,
    user_ref: &str,
) -> Result<entity::users::Model> {
    let requester = state
        .store
        .ensure_user(&auth.external_id, auth.email.as_deref())
        .await?;

    let target = if user_ref == "me" {
        requester.clone()
    } else {
        state
            .store
            .resolve_user_ref(user_ref)
            .await?
            .ok_or_else(|| MaasError::not_found("User", user_ref))?
    };

    if !auth.is_admin() && target.id != requester.id {
        return Err(MaasError::permission(
            "You can only operate on your own resources",
        ));
    }

    Ok(target)
}

/// POST /teams/{team_ref}/keys
pub async fn create_team_key(
    State(state): State<AppState>,
    Path(team_ref): Path<String>,
    Extension(auth): Extension<Arc<AuthContext>>,
    axum::Json(request): axum::Json<CreateTeamKeyRequest>,
) -> Response {
    let team = match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    // 解析不到主体时降级为团队服务密钥
    let owner = match &request.user_id {
        Some(user_ref) => match state.store.resolve_user_ref(user_ref).await {
            Ok(Some(user)) => KeyOwner::User(user.id),
            Ok(None) => KeyOwner::TeamService,
            Err(err) => return response::app_error(err),
        },
        None => KeyOwner::TeamService,
    };

    let (key, plaintext) = match state
        .store
        .create_key(team.id, owner, &request.alias, request.expires_at)
        .await
    {
        Ok(created) => created,
        Err(err) => return response::app_error(err),
    };

    audit_event(
        &state,
        &auth,
        "key.create",
        format!("teams/{}/keys/{}", team.ext_id, key.key_prefix),
        json!({"user_id": key.user_id}),
    );

    response::json_ok(MintedKeyResponse {
        api_key: plaintext,
        key_id: key.id,
        key_prefix: key.key_prefix,
        team_id: team.id,
        team_ext_id: team.ext_id,
        user_id: key.user_id,
        alias: key.alias,
        created_at: key.created_at,
    })
}

/// GET /teams/{team_ref}/keys
pub async fn list_team_keys(
    State(state): State<AppState>,
    Path(team_ref): Path<String>,
) -> Response {
    let team = match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    let keys = match state.store.list_team_keys(team.id).await {
        Ok(keys) => keys,
        Err(err) => return response::app_error(err),
    };

    let keys: Vec<KeySummary> = keys.into_iter().map(KeySummary::from).collect();
    response::json_ok(json!({
        "team_id": team.id,
        "team_ext_id": team.ext_id,
        "team_name": team.name,
        "keys": keys,
        "total_keys": keys.len(),
    }))
}

/// POST /users/{user_ref}/keys
pub async fn create_user_key(
    State(state): State<AppState>,
    Path(user_ref): Path<String>,
    Extension(auth): Extension<Arc<AuthContext>>,
    axum::Json(request): axum::Json<CreateUserKeyRequest>,
) -> Response {
    let target = match resolve_target_user(&state, &auth, &user_ref).await {
        Ok(target) => target,
        Err(err) => return response::app_error(err),
    };

    // 未指定团队时取目标用户的第一个成员团队
    let team = if let Some(team_ref) = &request.team_id {
        match state.store.resolve_team_ref(team_ref).await {
            Ok(team) => team,
            Err(err) => return response::app_error(err),
        }
    } else {
        let memberships = match state.store.list_user_memberships(target.id).await {
            Ok(memberships) => memberships,
            Err(err) => return response::app_error(err),
        };
        let Some(first) = memberships.first() else {
            return response::app_error(MaasError::validation(
                "user has no team membership; pass team_id explicitly",
            ));
        };
        match state.store.get_team_by_id(first.team_id).await {
            Ok(Some(team)) => team,
            Ok(None) => {
                return response::app_error(MaasError::not_found(
                    "Team",
                    first.team_id.to_string(),
                ));
            }
            Err(err) => return response::app_error(err),
        }
    };

    let (key, plaintext) = match state
        .store
        .create_key(
            team.id,
            KeyOwner::User(target.id),
            &request.alias,
            request.expires_at,
        )
        .await
    {
        Ok(created) => created,
        Err(err) => return response::app_error(err),
    };

    audit_event(
        &state,
        &auth,
        "key.create",
        format!("users/{}/keys/{}", target.id, key.key_prefix),
        json!({"team_id": team.id}),
    );

    response::json_ok(MintedKeyResponse {
        api_key: plaintext,
        key_id: key.id,
        key_prefix: key.key_prefix,
        team_id: team.id,
        team_ext_id: team.ext_id,
        user_id: key.user_id,
        alias: key.alias,
        created_at: key.created_at,
    })
}

/// GET /users/{user_ref}/keys
pub async fn list_user_keys(
    State(state): State<AppState>,
    Path(user_ref): Path<String>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Response {
    let target = match resolve_target_user(&state, &auth, &user_ref).await {
        Ok(target) => target,
        Err(err) => return response::app_error(err),
    };

    let keys = match state.store.list_user_keys(target.id).await {
        Ok(keys) => keys,
        Err(err) => return response::app_error(err),
    };

    // 团队信息按需查一次，跨条目复用
    let mut team_cache: HashMap<Uuid, (String, String)> = HashMap::new();
    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let team_info = match team_cache.get(&key.team_id) {
            Some(info) => Some(info.clone()),
            None => match state.store.get_team_by_id(key.team_id).await {
                Ok(Some(team)) => {
                    let info = (team.ext_id, team.name);
                    team_cache.insert(key.team_id, info.clone());
                    Some(info)
                }
                Ok(None) => None,
                Err(err) => return response::app_error(err),
            },
        };

        entries.push(UserKeyEntry {
            key: KeySummary::from(key),
            team_ext_id: team_info.as_ref().map(|(ext_id, _)| ext_id.clone()),
            team_name: team_info.map(|(_, name)| name),
        });
    }

    response::json_ok(json!({
        "user_id": target.id,
        "keys": entries,
        "total_keys": entries.len(),
    }))
}

/// DELETE /keys/{key_prefix}
pub async fn delete_key(
    State(state): State<AppState>,
    Path(key_prefix): Path<String>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Response {
    let deleted = match state.store.delete_key_by_prefix(&key_prefix).await {
        Ok(deleted) => deleted,
        Err(err) => return response::app_error(err),
    };

    audit_event(
        &state,
        &auth,
        "key.delete",
        format!("keys/{}", deleted.key_prefix),
        json!({"team_id": deleted.team_id}),
    );

    response::json_ok(json!({
        "message": "API key deleted successfully",
        "key_id": deleted.key_id,
        "key_prefix": deleted.key_prefix,
        "alias": deleted.alias,
        "team_id": deleted.team_id,
        "deleted_by": auth.external_id,
    }))
}
