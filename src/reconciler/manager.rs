//! # 策略同步器
//!
//! 对同一份文档的并发 upsert 会互相竞争，这里用内部互斥串行化
//! 读-改-写，再配合存储侧的版本乐观并发兜底重试。调用方不能假设
//! 返回成功前文档已反映自己的写入。

use std::sync::Arc;

use super::store::PolicyStore;
use super::types::{team_limit, PolicySpec, TokenRateLimitPolicy};
use crate::error::{MaasError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::store::Store;
use crate::{ldebug, lwarn};

/// 版本冲突时的最大重试次数
const MAX_CAS_ATTEMPTS: usize = 3;

/// 把数据库团队配置投影到外部策略文档
pub struct Reconciler {
    store: Store,
    policy_store: Arc<dyn PolicyStore>,
    policy_name: String,
    namespace: String,
    lock: tokio::sync::Mutex<()>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Store,
        policy_store: Arc<dyn PolicyStore>,
        policy_name: String,
        namespace: String,
    ) -> Self {
        Self {
            store,
            policy_store,
            policy_name,
            namespace,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// 替换指定团队的条目；文档不存在则创建
    pub async fn upsert(&self, ext_id: &str, rate_limit: i32, rate_window: &str) -> Result<()> {
        let entry = team_limit(ext_id, rate_limit, rate_window);
        let ext_id = ext_id.to_string();
        self.mutate(move |spec| {
            spec.limits.insert(ext_id.clone(), entry.clone());
        })
        .await
    }

    /// 移除指定团队的条目
    pub async fn remove(&self, ext_id: &str) -> Result<()> {
        let ext_id = ext_id.to_string();
        self.mutate(move |spec| {
            spec.limits.remove(&ext_id);
        })
        .await
    }

    /// 从数据库全量重建文档（周期任务与漂移修复）
    pub async fn rebuild(&self) -> Result<()> {
        let teams = self.store.list_teams().await?;
        self.mutate(move |spec| {
            spec.limits.clear();
            for team in &teams {
                spec.limits.insert(
                    team.ext_id.clone(),
                    team_limit(&team.ext_id, team.rate_limit, &team.rate_window),
                );
            }
        })
        .await
    }

    /// 串行化的读-改-写，版本冲突时重读重试
    async fn mutate<F>(&self, mut apply: F) -> Result<()>
    where
        F: FnMut(&mut PolicySpec),
    {
        let _guard = self.lock.lock().await;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut policy = self
                .policy_store
                .get(&self.policy_name)
                .await?
                .unwrap_or_else(|| TokenRateLimitPolicy::empty(&self.policy_name, &self.namespace));

            apply(&mut policy.spec);

            match self.policy_store.put(&policy).await {
                Ok(stored) => {
                    ldebug!(
                        "system",
                        LogStage::Reconciliation,
                        LogComponent::Reconciler,
                        "policy_written",
                        &format!(
                            "Policy document updated, {} team entries, version {:?}",
                            stored.spec.limits.len(),
                            stored.metadata.resource_version
                        )
                    );
                    return Ok(());
                }
                Err(MaasError::Conflict { .. }) if attempt < MAX_CAS_ATTEMPTS => {
                    lwarn!(
                        "system",
                        LogStage::Reconciliation,
                        LogComponent::Reconciler,
                        "policy_cas_retry",
                        &format!("Policy document version conflict, retrying ({attempt})")
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(MaasError::upstream("策略文档版本冲突重试耗尽"))
    }
}
