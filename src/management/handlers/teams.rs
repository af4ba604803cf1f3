//! # 团队管理处理器
//!
//! 团队路径段同时接受内部id与 ext_id。限流相关变更在数据库事务
//! 提交后尽力同步到外部策略文档，同步失败只告警：文档是派生视
//! 图，由周期重建收敛。

use axum::extract::{Extension, Path, State};
use axum::response::Response;
use chrono::Utc;
use entity::team_memberships::MembershipRole;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::MaasError;
use crate::logging::{LogComponent, LogStage};
use crate::lwarn;
use crate::management::middleware::AuthContext;
use crate::management::response;
use crate::management::server::AppState;
use crate::store::{NewTeam, TeamPatch};

use super::audit_event;

/// 新建团队请求；限流字段缺省时取配置默认值
#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub ext_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rate_limit: Option<i32>,
    pub rate_window: Option<String>,
}

/// 团队部分更新请求
#[derive(Debug, Deserialize, Default)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rate_limit: Option<i32>,
    pub rate_window: Option<String>,
}

/// 添加成员请求；user_id 接受内部id或身份提供方标识
#[derive(Debug, Deserialize)]
pub struct AddTeamMemberRequest {
    pub user_id: String,
    pub role: Option<String>,
}

/// 模型授权请求；user_id 为空表示团队级授权
#[derive(Debug, Deserialize)]
pub struct CreateModelGrantRequest {
    pub user_id: Option<Uuid>,
    pub model_id: String,
    pub role: Option<String>,
}

/// 同步团队限流到策略文档，失败只告警
async fn sync_rate_limit(state: &AppState, ext_id: &str, rate_limit: i32, rate_window: &str) {
    if let Err(err) = state.reconciler.upsert(ext_id, rate_limit, rate_window).await {
        lwarn!(
            "system",
            LogStage::Reconciliation,
            LogComponent::Teams,
            "policy_sync_fail",
            &format!("Failed to sync rate limits for team {ext_id}: {err}")
        );
    }
}

/// 从策略文档移除团队条目，失败只告警
async fn drop_rate_limit(state: &AppState, ext_id: &str) {
    if let Err(err) = state.reconciler.remove(ext_id).await {
        lwarn!(
            "system",
            LogStage::Reconciliation,
            LogComponent::Teams,
            "policy_remove_fail",
            &format!("Failed to remove team {ext_id} from policy document: {err}")
        );
    }
}

fn parse_membership_role(raw: Option<&str>) -> Result<MembershipRole, MaasError> {
    match raw.unwrap_or("member") {
        "owner" => Ok(MembershipRole::Owner),
        "admin" => Ok(MembershipRole::Admin),
        "member" => Ok(MembershipRole::Member),
        "viewer" => Ok(MembershipRole::Viewer),
        other => Err(MaasError::validation_field(
            format!("unknown role {other:?}, expected owner/admin/member/viewer"),
            "role",
        )),
    }
}

/// GET /teams
pub async fn list_teams(State(state): State<AppState>) -> Response {
    match state.store.list_teams().await {
        Ok(teams) => response::json_ok(json!({
            "teams": teams,
            "total_teams": teams.len(),
        })),
        Err(err) => response::app_error(err),
    }
}

/// POST /teams
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    axum::Json(request): axum::Json<CreateTeamRequest>,
) -> Response {
    let rate_limit = request.rate_limit.unwrap_or(state.config.default_rate_limit);
    let rate_window = request
        .rate_window
        .unwrap_or_else(|| state.config.default_rate_window.clone());

    let team = match state
        .store
        .create_team(NewTeam {
            ext_id: request.ext_id,
            name: request.name,
            description: request.description,
            rate_limit,
            rate_window,
        })
        .await
    {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    sync_rate_limit(&state, &team.ext_id, team.rate_limit, &team.rate_window).await;
    audit_event(
        &state,
        &auth,
        "team.create",
        format!("teams/{}", team.ext_id),
        json!({"rate_limit": team.rate_limit, "rate_window": team.rate_window}),
    );

    response::json_ok(team)
}

/// GET /teams/{team_ref}
pub async fn get_team(State(state): State<AppState>, Path(team_ref): Path<String>) -> Response {
    match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => response::json_ok(team),
        Err(err) => response::app_error(err),
    }
}

/// PATCH /teams/{team_ref}
pub async fn update_team(
    State(state): State<AppState>,
    Path(team_ref): Path<String>,
    Extension(auth): Extension<Arc<AuthContext>>,
    axum::Json(request): axum::Json<UpdateTeamRequest>,
) -> Response {
    let current = match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    let team = match state
        .store
        .update_team(
            current.id,
            TeamPatch {
                name: request.name,
                description: request.description,
                rate_limit: request.rate_limit,
                rate_window: request.rate_window,
            },
        )
        .await
    {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    let rate_changed =
        team.rate_limit != current.rate_limit || team.rate_window != current.rate_window;
    if rate_changed {
        sync_rate_limit(&state, &team.ext_id, team.rate_limit, &team.rate_window).await;
    }
    audit_event(
        &state,
        &auth,
        "team.update",
        format!("teams/{}", team.ext_id),
        json!({"rate_changed": rate_changed}),
    );

    response::json_ok(json!({
        "message": "Team updated successfully",
        "team": team,
    }))
}

/// DELETE /teams/{team_ref}
pub async fn delete_team(
    State(state): State<AppState>,
    Path(team_ref): Path<String>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Response {
    let team = match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    let result = match state.store.delete_team_cascade(team.id).await {
        Ok(result) => result,
        Err(err) => return response::app_error(err),
    };

    drop_rate_limit(&state, &result.ext_id).await;
    audit_event(
        &state,
        &auth,
        "team.delete",
        format!("teams/{}", result.ext_id),
        json!({"cascaded_key_count": result.cascaded_key_count}),
    );

    response::json_ok(json!({
        "message": "Team deleted successfully",
        "team_id": result.team_id,
        "ext_id": result.ext_id,
        "name": result.name,
        "cascaded_key_count": result.cascaded_key_count,
        "deleted_by": auth.external_id,
    }))
}

/// POST /teams/{team_ref}/members
pub async fn add_team_member(
    State(state): State<AppState>,
    Path(team_ref): Path<String>,
    Extension(auth): Extension<Arc<AuthContext>>,
    axum::Json(request): axum::Json<AddTeamMemberRequest>,
) -> Response {
    let team = match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    let user = match state.store.resolve_user_ref(&request.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return response::app_error(MaasError::not_found("User", &request.user_id));
        }
        Err(err) => return response::app_error(err),
    };

    let role = match parse_membership_role(request.role.as_deref()) {
        Ok(role) => role,
        Err(err) => return response::app_error(err),
    };

    let membership = match state.store.add_member(team.id, user.id, role).await {
        Ok(membership) => membership,
        Err(err) => return response::app_error(err),
    };

    audit_event(
        &state,
        &auth,
        "team.member.add",
        format!("teams/{}/members/{}", team.ext_id, user.id),
        json!({"role": membership.role.as_str()}),
    );

    response::json_ok(json!({
        "message": "User added to team successfully",
        "team_id": team.id,
        "user_id": user.id,
        "role": membership.role.as_str(),
        "added_by": auth.external_id,
        "added_at": membership.joined_at,
    }))
}

/// GET /teams/{team_ref}/members
pub async fn list_team_members(
    State(state): State<AppState>,
    Path(team_ref): Path<String>,
) -> Response {
    let team = match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    let members = match state.store.list_members(team.id).await {
        Ok(members) => members,
        Err(err) => return response::app_error(err),
    };

    let members: Vec<_> = members
        .into_iter()
        .map(|(membership, user)| {
            json!({
                "user_id": membership.user_id,
                "email": user.as_ref().and_then(|u| u.email.clone()),
                "display_name": user.map(|u| u.display_name),
                "role": membership.role.as_str(),
                "joined_at": membership.joined_at,
            })
        })
        .collect();

    response::json_ok(json!({
        "team_id": team.id,
        "members": members,
        "total": members.len(),
    }))
}

/// DELETE /teams/{team_ref}/members/{user_id}
pub async fn remove_team_member(
    State(state): State<AppState>,
    Path((team_ref, user_ref)): Path<(String, String)>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Response {
    let team = match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    let user = match super::keys::resolve_target_user(&state, &auth, &user_ref).await {
        Ok(user) => user,
        Err(err) => return response::app_error(err),
    };

    if let Err(err) = state.store.remove_member(team.id, user.id).await {
        return response::app_error(err);
    }

    audit_event(
        &state,
        &auth,
        "team.member.remove",
        format!("teams/{}/members/{}", team.ext_id, user.id),
        json!({}),
    );

    response::json_ok(json!({
        "message": "User removed from team successfully",
        "team_id": team.id,
        "user_id": user.id,
        "removed_by": auth.external_id,
        "removed_at": Utc::now(),
    }))
}

/// POST /teams/{team_ref}/grants
pub async fn create_model_grant(
    State(state): State<AppState>,
    Path(team_ref): Path<String>,
    Extension(auth): Extension<Arc<AuthContext>>,
    axum::Json(request): axum::Json<CreateModelGrantRequest>,
) -> Response {
    let team = match state.store.resolve_team_ref(&team_ref).await {
        Ok(team) => team,
        Err(err) => return response::app_error(err),
    };

    let role = request.role.as_deref().unwrap_or("invoke");
    let grant = match state
        .store
        .create_grant(team.id, request.user_id, &request.model_id, role)
        .await
    {
        Ok(grant) => grant,
        Err(err) => return response::app_error(err),
    };

    audit_event(
        &state,
        &auth,
        "team.grant.create",
        format!("teams/{}/grants/{}", team.ext_id, grant.id),
        json!({"model": request.model_id, "user_id": request.user_id}),
    );

    response::json_ok(json!({
        "id": grant.id,
        "team_id": grant.team_id,
        "user_id": grant.user_id,
        "model_id": grant.model_id,
        "role": grant.role,
    }))
}
