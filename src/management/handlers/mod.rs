//! # 处理器模块

pub mod health;
pub mod identity;
pub mod introspect;
pub mod keys;
pub mod models;
pub mod teams;
pub mod usage;

use crate::logging::{LogComponent, LogStage};
use crate::lwarn;
use crate::management::middleware::AuthContext;
use crate::management::server::AppState;

/// 尽力而为地写审计事件，不阻塞请求
pub(crate) fn audit_event(
    state: &AppState,
    auth: &AuthContext,
    action: &str,
    resource: String,
    detail: serde_json::Value,
) {
    let store = state.store.clone();
    let actor = auth.external_id.clone();
    let action = action.to_string();
    tokio::spawn(async move {
        if let Err(err) = store.record_event(&actor, &action, &resource, detail).await {
            lwarn!(
                &actor,
                LogStage::Internal,
                LogComponent::Audit,
                "audit_write_fail",
                &format!("Failed to record audit event {action}: {err}")
            );
        }
    });
}
