//! # 统一日志工具模块
//!
//! 提供结构化业务日志宏与日志系统初始化。

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志阶段枚举
#[derive(Debug, Clone, Copy)]
pub enum LogStage {
    RequestStart,
    Authentication,
    Introspection,
    Reconciliation,
    Response,
    Error,
    Startup,
    Shutdown,
    Configuration,
    BackgroundTask,
    ExternalApi,
    Internal,
    Db,
}

impl LogStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequestStart => "request_start",
            Self::Authentication => "authentication",
            Self::Introspection => "introspection",
            Self::Reconciliation => "reconciliation",
            Self::Response => "response",
            Self::Error => "error",
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::BackgroundTask => "background_task",
            Self::ExternalApi => "external_api",
            Self::Internal => "internal",
            Self::Db => "db",
        }
    }
}

/// 组件枚举
#[derive(Debug, Clone, Copy)]
pub enum LogComponent {
    Main,
    ServerSetup,
    Config,
    Database,
    Store,
    Identity,
    KeyMint,
    Introspect,
    Reconciler,
    PolicyStore,
    Teams,
    Keys,
    Usage,
    Audit,
}

impl LogComponent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::ServerSetup => "server_setup",
            Self::Config => "config",
            Self::Database => "database",
            Self::Store => "store",
            Self::Identity => "identity",
            Self::KeyMint => "key_mint",
            Self::Introspect => "introspect",
            Self::Reconciler => "reconciler",
            Self::PolicyStore => "policy_store",
            Self::Teams => "teams",
            Self::Keys => "keys",
            Self::Usage => "usage",
            Self::Audit => "audit",
        }
    }
}

/// 标准日志宏 - 信息级别
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::info!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::info!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 调试级别
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::debug!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::debug!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 警告级别
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::warn!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::warn!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 错误级别
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::error!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::error!(
            request_id = %$request_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 初始化日志系统，RUST_LOG 可覆盖默认级别
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("maas_api={default_level},tower_http=info")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
