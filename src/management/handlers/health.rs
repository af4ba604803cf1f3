//! # 存活检查处理器

use axum::response::Response;
use serde_json::json;

use crate::management::response;

/// GET /health
pub async fn health_check() -> Response {
    response::json_ok(json!({"status": "ok"}))
}
