//! # API 响应结构
//!
//! 成功响应直接输出业务JSON；失败统一为 `{"error": "<short message>"}`，
//! 消息不携带内部标识、查询文本或哈希。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::error::MaasError;
use crate::logging::{LogComponent, LogStage};
use crate::{lerror, lwarn};

/// 标准错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// 便捷函数：200 + JSON
pub fn json_ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// 便捷函数：指定状态码的错误响应
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// 把应用错误翻译为HTTP响应并记录日志
pub fn app_error(err: MaasError) -> Response {
    let (status, code) = err.to_http_response_parts();
    if status.is_server_error() {
        lerror!(
            "http",
            LogStage::Error,
            LogComponent::ServerSetup,
            code,
            &format!("{err:?}")
        );
    } else {
        lwarn!(
            "http",
            LogStage::Response,
            LogComponent::ServerSetup,
            code,
            &err.to_string()
        );
    }
    error_response(status, &err.client_message())
}

impl IntoResponse for MaasError {
    fn into_response(self) -> Response {
        app_error(self)
    }
}
