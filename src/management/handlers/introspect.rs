//! # 内省端点处理器
//!
//! 同时接受 application/json 与 application/x-www-form-urlencoded；
//! 提取不到 token 视为请求畸形（400），其余一律 200。

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::introspect::IntrospectRequest;
use crate::management::server::AppState;

/// POST /introspect
pub async fn introspect(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(request) = parse_body(&body) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"active": false}))).into_response();
    };

    let response = state
        .introspector
        .introspect(&request.token, request.run_as_user_id.as_deref())
        .await;

    Json(response).into_response()
}

/// JSON优先，失败回退表单解析；两种形式都要求非空 token
fn parse_body(body: &[u8]) -> Option<IntrospectRequest> {
    serde_json::from_slice::<IntrospectRequest>(body)
        .ok()
        .or_else(|| serde_urlencoded::from_bytes::<IntrospectRequest>(body).ok())
        .filter(|request| !request.token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::parse_body;

    #[test]
    fn parses_json_body() {
        let request = parse_body(br#"{"token":"abc12345","run_as_user_id":"u-1"}"#).unwrap();
        assert_eq!(request.token, "abc12345");
        assert_eq!(request.run_as_user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn parses_form_body() {
        let request = parse_body(b"token=abc12345&run_as_user_id=u-1").unwrap();
        assert_eq!(request.token, "abc12345");
        assert_eq!(request.run_as_user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn form_without_run_as() {
        let request = parse_body(b"token=abc12345").unwrap();
        assert!(request.run_as_user_id.is_none());
    }

    #[test]
    fn rejects_missing_token() {
        assert!(parse_body(b"").is_none());
        assert!(parse_body(b"{}").is_none());
        assert!(parse_body(b"token=").is_none());
        assert!(parse_body(b"run_as_user_id=u-1").is_none());
    }
}
