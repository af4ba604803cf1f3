//! # 用量样本落库

use chrono::{DateTime, Utc};
use entity::usage_metrics;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use super::Store;
use crate::error::Result;

impl Store {
    /// 记录一条抓取到的用量汇总样本（调用方尽力而为）
    pub async fn record_usage_sample(
        &self,
        namespace: &str,
        metric: &str,
        value: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        let sample = usage_metrics::ActiveModel {
            id: Set(Uuid::new_v4()),
            namespace: Set(namespace.to_string()),
            metric: Set(metric.to_string()),
            value: Set(value),
            recorded_at: Set(recorded_at),
        };
        sample.insert(&self.db).await?;
        Ok(())
    }
}
