//! # 启动期引导
//!
//! default 团队补建、管理员种子密钥注入与周期性策略重建任务。
//! 引导动作都是幂等的，重复启动不产生副作用。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::{MaasError, Result};
use crate::keys::KeyOwner;
use crate::logging::{LogComponent, LogStage};
use crate::reconciler::Reconciler;
use crate::store::{NewTeam, Store};
use crate::{linfo, lwarn};

/// default 团队的固定 ext_id
pub const DEFAULT_TEAM_EXT_ID: &str = "default";

/// 确保 default 团队存在并注入管理员种子密钥（按配置）
pub async fn run(config: &AppConfig, store: &Store, reconciler: &Reconciler) -> Result<()> {
    if !config.create_default_team {
        return Ok(());
    }

    let team = match store.get_team_by_ext_id(DEFAULT_TEAM_EXT_ID).await? {
        Some(team) => team,
        None => {
            let team = store
                .create_team(NewTeam {
                    ext_id: DEFAULT_TEAM_EXT_ID.to_string(),
                    name: "Default Team".to_string(),
                    description: "Auto-created default team".to_string(),
                    rate_limit: config.default_rate_limit,
                    rate_window: config.default_rate_window.clone(),
                })
                .await?;
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Main,
                "default_team_created",
                "Default team created"
            );
            if let Err(err) = reconciler
                .upsert(&team.ext_id, team.rate_limit, &team.rate_window)
                .await
            {
                lwarn!(
                    "system",
                    LogStage::Reconciliation,
                    LogComponent::Main,
                    "default_team_sync_fail",
                    &format!("Failed to sync default team rate limits: {err}")
                );
            }
            team
        }
    };

    if let Some(admin_key) = &config.admin_api_key {
        match store
            .create_key_from_plaintext(team.id, KeyOwner::TeamService, admin_key, "admin-seed")
            .await
        {
            Ok(_) => {
                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Main,
                    "admin_seed_injected",
                    "Admin seed credential injected into default team"
                );
            }
            // 已注入过：前缀冲突属预期
            Err(MaasError::Conflict { .. }) => {}
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

/// 启动周期性全量重建，收敛策略文档与数据库的漂移
pub fn spawn_rebuild_task(reconciler: Arc<Reconciler>, interval_secs: u64) {
    if interval_secs == 0 {
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // 首个tick立即触发，先做一次启动期收敛
        loop {
            interval.tick().await;
            if let Err(err) = reconciler.rebuild().await {
                lwarn!(
                    "system",
                    LogStage::BackgroundTask,
                    LogComponent::Reconciler,
                    "periodic_rebuild_fail",
                    &format!("Periodic policy rebuild failed: {err}")
                );
            }
        }
    });
}
