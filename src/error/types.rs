//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum MaasError {
    /// 输入验证错误
    #[error("验证错误: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 认证错误（缺少PEP注入的身份头）
    #[error("认证错误: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 权限错误（角色不足或跨用户操作）
    #[error("权限错误: {message}")]
    Permission {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 资源未找到错误
    #[error("资源未找到: {resource_type} {identifier}")]
    NotFound {
        resource_type: String,
        identifier: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 资源冲突错误（唯一约束冲突）
    #[error("资源冲突: {resource_type} {identifier}")]
    Conflict {
        resource_type: String,
        identifier: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游服务错误（编排器或时序后端）
    #[error("上游服务错误: {message}")]
    Upstream {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务器初始化错误
    #[error("服务器初始化错误: {message}")]
    ServerInit {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务器启动错误
    #[error("服务器启动错误: {message}")]
    ServerStart {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl MaasError {
    /// 将错误转换为HTTP状态码和错误代码
    pub fn to_http_response_parts(&self) -> (StatusCode, &str) {
        match self {
            MaasError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            MaasError::Authentication { .. } => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
            MaasError::Permission { .. } => (StatusCode::FORBIDDEN, "PERMISSION_ERROR"),
            MaasError::NotFound { .. } => (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            MaasError::Conflict { .. } => (StatusCode::CONFLICT, "RESOURCE_CONFLICT"),
            MaasError::Database { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            MaasError::Upstream { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            MaasError::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            MaasError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            MaasError::Serialization { .. } => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
            MaasError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            MaasError::ServerInit { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_INIT_ERROR")
            }
            MaasError::ServerStart { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_START_ERROR")
            }
        }
    }

    /// 面向调用方的简短错误消息，不泄露内部标识、SQL或哈希
    pub fn client_message(&self) -> String {
        match self {
            MaasError::Validation { message, .. } => message.clone(),
            MaasError::Authentication { .. } => "Authentication required".to_string(),
            MaasError::Permission { message, .. } => message.clone(),
            MaasError::NotFound { resource_type, .. } => format!("{resource_type} not found"),
            MaasError::Conflict { resource_type, .. } => {
                format!("{resource_type} already exists")
            }
            MaasError::Upstream { message, .. } => message.clone(),
            _ => "Internal server error".to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            source: None,
        }
    }

    /// 创建针对具体字段的验证错误
    pub fn validation_field<T: Into<String>, F: Into<String>>(message: T, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            source: None,
        }
    }

    /// 创建认证错误
    pub fn authentication<T: Into<String>>(message: T) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// 创建权限错误
    pub fn permission<T: Into<String>>(message: T) -> Self {
        Self::Permission {
            message: message.into(),
            source: None,
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<T: Into<String>, I: Into<String>>(resource_type: T, identifier: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
            source: None,
        }
    }

    /// 创建资源冲突错误
    pub fn conflict<T: Into<String>, I: Into<String>>(resource_type: T, identifier: I) -> Self {
        Self::Conflict {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
            source: None,
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建上游服务错误
    pub fn upstream<T: Into<String>>(message: T) -> Self {
        Self::Upstream {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的上游服务错误
    pub fn upstream_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Upstream {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建服务器初始化错误
    pub fn server_init<T: Into<String>>(message: T) -> Self {
        Self::ServerInit {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的服务器初始化错误
    pub fn server_init_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerInit {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的服务器启动错误
    pub fn server_start_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for MaasError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "文件操作失败".to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for MaasError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON处理失败".to_string(),
            source: err.into(),
        }
    }
}

impl From<sea_orm::error::DbErr> for MaasError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::database_with_source("数据库操作失败", err)
    }
}

impl From<reqwest::Error> for MaasError {
    fn from(err: reqwest::Error) -> Self {
        Self::upstream_with_source("HTTP请求失败", err)
    }
}
