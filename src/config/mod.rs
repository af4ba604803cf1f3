//! # 配置模块
//!
//! 环境变量驱动的应用配置

mod app_config;
mod duration;

pub use app_config::{AppConfig, OrchestratorConfig, PrometheusConfig};
pub use duration::is_valid_duration;
