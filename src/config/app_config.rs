//! # 应用配置结构定义
//!
//! 所有配置项来自环境变量；默认值集中在这里，处理器一律不内置默认值。

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 应用主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP监听端口
    pub port: u16,
    /// 服务名（日志与审计标识）
    pub service_name: String,
    /// 数据库连接URL
    pub database_url: String,
    /// 编排器中租户资源所在的命名空间
    pub key_namespace: String,
    /// 是否在启动时确保 default 团队存在
    pub create_default_team: bool,
    /// 管理员种子密钥（可选，启动时注入 default 团队）
    pub admin_api_key: Option<String>,
    /// 新建团队未指定时的默认限流值
    pub default_rate_limit: i32,
    /// 新建团队未指定时的默认限流窗口
    pub default_rate_window: String,
    /// 周期性策略重建间隔（秒，0 表示禁用）
    pub reconcile_interval_secs: u64,
    /// 调试模式
    pub debug: bool,
    /// 编排器配置
    pub orchestrator: OrchestratorConfig,
    /// Prometheus用量查询配置
    pub prometheus: PrometheusConfig,
}

/// 编排器（策略文档存储）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// 编排器API地址（为空则使用内存策略存储，仅限开发）
    pub base_url: Option<String>,
    /// 服务账号令牌文件路径
    pub token_path: String,
    /// 限流策略文档的名称
    pub policy_name: String,
}

/// Prometheus用量查询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Prometheus地址（为空则禁用用量端点）
    pub base_url: Option<String>,
    /// 鉴权令牌文件路径
    pub token_path: String,
    /// 额外信任的CA证书路径
    pub ca_path: String,
    /// 是否跳过TLS校验
    pub insecure_skip_verify: bool,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    /// 默认查询范围
    pub default_range: String,
    /// 是否输出查询调试日志
    pub debug: bool,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            port: env_or("PORT", "8080").parse().map_err(|_| {
                crate::error::MaasError::config("PORT 必须是合法端口号")
            })?,
            service_name: env_or("SERVICE_NAME", "maas-api"),
            database_url: env_or("DATABASE_URL", "sqlite://maas.db?mode=rwc"),
            key_namespace: env_or("KEY_NAMESPACE", "llm"),
            create_default_team: env_or("CREATE_DEFAULT_TEAM", "true") == "true",
            admin_api_key: std::env::var("ADMIN_API_KEY").ok().filter(|v| !v.is_empty()),
            default_rate_limit: env_or("DEFAULT_RATE_LIMIT", "100").parse().map_err(|_| {
                crate::error::MaasError::config("DEFAULT_RATE_LIMIT 必须是正整数")
            })?,
            default_rate_window: env_or("DEFAULT_RATE_WINDOW", "1m"),
            reconcile_interval_secs: env_or("RECONCILE_INTERVAL_SECS", "300")
                .parse()
                .unwrap_or(300),
            debug: env_or("DEBUG", "false") == "true",
            orchestrator: OrchestratorConfig {
                base_url: std::env::var("ORCHESTRATOR_BASE_URL")
                    .ok()
                    .filter(|v| !v.is_empty()),
                token_path: env_or(
                    "ORCHESTRATOR_TOKEN_PATH",
                    "/var/run/secrets/kubernetes.io/serviceaccount/token",
                ),
                policy_name: env_or("TOKEN_RATE_LIMIT_POLICY_NAME", "gateway-token-rate-limits"),
            },
            prometheus: PrometheusConfig {
                base_url: std::env::var("PROMETHEUS_URL").ok().filter(|v| !v.is_empty()),
                token_path: env_or(
                    "PROMETHEUS_TOKEN_PATH",
                    "/var/run/secrets/kubernetes.io/serviceaccount/token",
                ),
                ca_path: env_or(
                    "PROMETHEUS_CA_PATH",
                    "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt",
                ),
                insecure_skip_verify: env_or("PROMETHEUS_INSECURE_SKIP_VERIFY", "false") == "true",
                timeout_secs: env_or("PROMETHEUS_TIMEOUT_SECS", "10").parse().unwrap_or(10),
                default_range: env_or("USAGE_DEFAULT_RANGE", "24h"),
                debug: env_or("PROMETHEUS_DEBUG", "false") == "true",
            },
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// 配置自检，启动时失败即退出
    fn validate(&self) -> Result<()> {
        if self.default_rate_limit <= 0 {
            return Err(crate::error::MaasError::config(
                "DEFAULT_RATE_LIMIT 必须大于 0",
            ));
        }
        if !super::is_valid_duration(&self.default_rate_window) {
            return Err(crate::error::MaasError::config(
                "DEFAULT_RATE_WINDOW 必须匹配时长格式，如 1m、24h",
            ));
        }
        if !super::is_valid_duration(&self.prometheus.default_range) {
            return Err(crate::error::MaasError::config(
                "USAGE_DEFAULT_RANGE 必须匹配时长格式，如 1h、24h",
            ));
        }
        Ok(())
    }
}

/// 读取环境变量或返回默认值
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig {
            port: 8080,
            service_name: "maas-api".into(),
            database_url: "sqlite::memory:".into(),
            key_namespace: "llm".into(),
            create_default_team: true,
            admin_api_key: None,
            default_rate_limit: 100,
            default_rate_window: "1m".into(),
            reconcile_interval_secs: 300,
            debug: false,
            orchestrator: OrchestratorConfig {
                base_url: None,
                token_path: "/tmp/token".into(),
                policy_name: "gateway-token-rate-limits".into(),
            },
            prometheus: PrometheusConfig {
                base_url: None,
                token_path: "/tmp/token".into(),
                ca_path: "/tmp/ca.crt".into(),
                insecure_skip_verify: false,
                timeout_secs: 10,
                default_range: "24h".into(),
                debug: false,
            },
        };
        assert!(cfg.validate().is_ok());

        let mut bad = cfg.clone();
        bad.default_rate_limit = 0;
        assert!(bad.validate().is_err());

        let mut bad = cfg;
        bad.default_rate_window = "1ms".into();
        assert!(bad.validate().is_err());
    }
}
