//! # 自助引导处理器
//!
//! GET /profile：按身份头补建用户，并尽力挂入 default 团队。

use axum::extract::{Extension, State};
use axum::response::Response;
use entity::team_memberships::MembershipRole;
use serde_json::json;
use std::sync::Arc;

use crate::lwarn;
use crate::logging::{LogComponent, LogStage};
use crate::management::middleware::AuthContext;
use crate::management::response;
use crate::management::server::AppState;

/// default 团队的 ext_id
const DEFAULT_TEAM_EXT_ID: &str = "default";

/// GET /profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Response {
    let user = match state
        .store
        .ensure_user(&auth.external_id, auth.email.as_deref())
        .await
    {
        Ok(user) => user,
        Err(err) => return response::app_error(err),
    };

    // default 团队可能尚未创建；挂入失败不阻塞引导
    if state.config.create_default_team {
        match state.store.get_team_by_ext_id(DEFAULT_TEAM_EXT_ID).await {
            Ok(Some(team)) => match state.store.is_member(team.id, user.id).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(err) = state
                        .store
                        .add_member(team.id, user.id, MembershipRole::Member)
                        .await
                    {
                        lwarn!(
                            &auth.external_id,
                            LogStage::Internal,
                            LogComponent::Identity,
                            "default_membership_fail",
                            &format!("Failed to join default team: {err}")
                        );
                    }
                }
                Err(err) => {
                    lwarn!(
                        &auth.external_id,
                        LogStage::Db,
                        LogComponent::Identity,
                        "membership_check_fail",
                        &format!("Failed to check default membership: {err}")
                    );
                }
            },
            Ok(None) => {}
            Err(err) => {
                lwarn!(
                    &auth.external_id,
                    LogStage::Db,
                    LogComponent::Identity,
                    "default_team_lookup_fail",
                    &format!("Failed to look up default team: {err}")
                );
            }
        }
    }

    response::json_ok(json!({
        "id": user.id,
        "external_id": user.external_id,
        "email": user.email,
        "display_name": user.display_name,
        "kind": user.kind,
    }))
}
