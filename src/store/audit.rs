//! # 审计事件存储操作

use chrono::Utc;
use entity::audit_events;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use super::Store;
use crate::error::Result;

impl Store {
    /// 写入一条审计事件；调用方以尽力而为方式使用
    pub async fn record_event(
        &self,
        actor: &str,
        action: &str,
        resource: &str,
        detail: serde_json::Value,
    ) -> Result<()> {
        let event = audit_events::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor: Set(actor.to_string()),
            action: Set(action.to_string()),
            resource: Set(resource.to_string()),
            detail: Set(detail),
            created_at: Set(Utc::now()),
        };
        event.insert(&self.db).await?;
        Ok(())
    }
}
