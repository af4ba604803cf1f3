//! # 凭证内省
//!
//! RFC 7662 兼容的密钥解析热路径。对外只有两种结果：完整的身份
//! 声明，或不带任何原因的 `active=false` —— 短令牌、未知前缀、
//! 哈希不符、吊销、过期在响应上不可区分。

use chrono::Utc;
use entity::api_keys::KeyStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::keys::{self, KEY_PREFIX_LEN};
use crate::logging::{LogComponent, LogStage};
use crate::store::Store;
use crate::lwarn;

/// 内省请求体（JSON或表单编码）
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectRequest {
    pub token: String,
    #[serde(default)]
    pub run_as_user_id: Option<String>,
}

/// 内省响应；`active=false` 时其余字段一律缺省
#[derive(Debug, Clone, Serialize, Default)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_allowed: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

impl IntrospectResponse {
    /// 统一的拒绝响应
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// 内省服务：无状态，可在任意并发下安全使用
#[derive(Clone)]
pub struct Introspector {
    store: Store,
}

impl Introspector {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// 解析令牌；一切失败（含存储故障）都折叠为 `active=false`
    pub async fn introspect(
        &self,
        token: &str,
        run_as_user_id: Option<&str>,
    ) -> IntrospectResponse {
        match self.resolve(token, run_as_user_id).await {
            Ok(response) => response,
            Err(err) => {
                lwarn!(
                    "introspect",
                    LogStage::Introspection,
                    LogComponent::Introspect,
                    "resolve_fail",
                    &format!("Introspection failed internally: {err}")
                );
                IntrospectResponse::inactive()
            }
        }
    }

    async fn resolve(
        &self,
        token: &str,
        run_as_user_id: Option<&str>,
    ) -> Result<IntrospectResponse> {
        let Some(prefix) = token.get(..KEY_PREFIX_LEN) else {
            return Ok(IntrospectResponse::inactive());
        };

        let Some(key) = self.store.find_key_by_prefix(prefix).await? else {
            return Ok(IntrospectResponse::inactive());
        };

        if !keys::verify(token, &key.hash_alg, &key.key_hash, &key.salt) {
            return Ok(IntrospectResponse::inactive());
        }

        if key.status != KeyStatus::Active {
            return Ok(IntrospectResponse::inactive());
        }
        if let Some(expires_at) = key.expires_at {
            if expires_at < Utc::now() {
                return Ok(IntrospectResponse::inactive());
            }
        }

        let Some(team) = self.store.get_team_by_id(key.team_id).await? else {
            return Ok(IntrospectResponse::inactive());
        };

        // 团队服务密钥必须声明 run_as，且 run_as 用户必须是团队成员；
        // 策略文档按 auth.identity.userid 计数，主体必须落到真实用户
        let effective_user_id: Uuid = match key.user_id {
            Some(user_id) => user_id,
            None => {
                let Some(run_as) = run_as_user_id.filter(|v| !v.is_empty()) else {
                    return Ok(IntrospectResponse::inactive());
                };
                let Some(user) = self.store.resolve_user_ref(run_as).await? else {
                    return Ok(IntrospectResponse::inactive());
                };
                if !self.store.is_member(team.id, user.id).await? {
                    return Ok(IntrospectResponse::inactive());
                }
                user.id
            }
        };

        let membership = self.store.find_membership(team.id, effective_user_id).await?;
        let models_allowed = self
            .store
            .models_allowed(team.id, Some(effective_user_id))
            .await?;

        // groups 首元素必须等于团队 ext_id，限流谓词按逗号切分精确匹配
        let mut groups = vec![team.ext_id.clone()];
        if let Some(membership) = &membership {
            groups.push(format!("role:{}", membership.role.as_str()));
        }

        // 尽力而为刷新 last_used_at，不阻塞响应
        let store = self.store.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            if let Err(err) = store.touch_last_used(key_id).await {
                lwarn!(
                    "introspect",
                    LogStage::Db,
                    LogComponent::Introspect,
                    "touch_last_used_fail",
                    &format!("Failed to update last_used_at: {err}")
                );
            }
        });

        Ok(IntrospectResponse {
            active: true,
            api_key_id: Some(key.id.to_string()),
            team_id: Some(team.ext_id.clone()),
            user_id: Some(effective_user_id.to_string()),
            groups: Some(groups.join(",")),
            models_allowed: Some(models_allowed),
            plan: Some(format!("{}/{}", team.rate_limit, team.rate_window)),
        })
    }
}
