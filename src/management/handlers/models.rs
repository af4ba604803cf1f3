//! # 模型目录处理器

use axum::extract::State;
use axum::response::Response;
use serde_json::json;

use crate::management::response;
use crate::management::server::AppState;

/// GET /models：仅枚举已发布模型
pub async fn list_models(State(state): State<AppState>) -> Response {
    match state.store.list_published_models().await {
        Ok(models) => response::json_ok(json!({
            "models": models,
            "total": models.len(),
        })),
        Err(err) => response::app_error(err),
    }
}
