//! # MaaS 控制面服务入口
//!
//! 启动顺序：配置 → 日志 → 数据库与迁移 → 策略存储与同步器 →
//! 用量客户端 → 引导 → HTTP服务。任何启动步骤失败都以非零码退出。

use std::sync::Arc;

use maas_api::config::AppConfig;
use maas_api::error::MaasError;
use maas_api::logging::{LogComponent, LogStage};
use maas_api::management::server::{AppState, ManagementServer};
use maas_api::reconciler::{HttpPolicyStore, MemoryPolicyStore, PolicyStore, Reconciler};
use maas_api::store::Store;
use maas_api::usage::UsageClient;
use maas_api::{bootstrap, database, linfo, lwarn};

#[tokio::main]
async fn main() -> maas_api::Result<()> {
    let config = Arc::new(AppConfig::from_env()?);
    maas_api::logging::init_logging(config.debug);

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "starting",
        &format!("{} starting on port {}", config.service_name, config.port)
    );

    let db = database::init_database(&config.database_url)
        .await
        .map_err(|e| MaasError::server_init_with_source("数据库连接失败", e))?;
    database::run_migrations(&db)
        .await
        .map_err(|e| MaasError::server_init_with_source("数据库迁移失败", e))?;

    let store = Store::new(db);

    // 未配置编排器时退化为内存策略存储，仅限本地开发
    let policy_store: Arc<dyn PolicyStore> = match &config.orchestrator.base_url {
        Some(base_url) => Arc::new(HttpPolicyStore::new(
            base_url,
            &config.key_namespace,
            &config.orchestrator.token_path,
        )?),
        None => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::Main,
                "memory_policy_store",
                "ORCHESTRATOR_BASE_URL not set, using in-memory policy store"
            );
            Arc::new(MemoryPolicyStore::new())
        }
    };

    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        policy_store,
        config.orchestrator.policy_name.clone(),
        config.key_namespace.clone(),
    ));

    let usage = UsageClient::from_config(&config.prometheus)?.map(Arc::new);
    if usage.is_none() {
        lwarn!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "usage_disabled",
            "PROMETHEUS_URL not set, usage endpoint disabled"
        );
    }

    bootstrap::run(&config, &store, &reconciler).await?;
    bootstrap::spawn_rebuild_task(reconciler.clone(), config.reconcile_interval_secs);

    let state = AppState::new(config, store, reconciler, usage);
    ManagementServer::new(state).serve().await
}
