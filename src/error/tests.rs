//! 错误映射单元测试

use super::MaasError;
use axum::http::StatusCode;

#[test]
fn http_status_mapping() {
    let cases = [
        (MaasError::validation("bad"), StatusCode::BAD_REQUEST),
        (
            MaasError::authentication("no identity"),
            StatusCode::UNAUTHORIZED,
        ),
        (MaasError::permission("nope"), StatusCode::FORBIDDEN),
        (
            MaasError::not_found("Team", "team-x"),
            StatusCode::NOT_FOUND,
        ),
        (MaasError::conflict("Team", "team-x"), StatusCode::CONFLICT),
        (MaasError::upstream("prometheus down"), StatusCode::BAD_GATEWAY),
        (MaasError::database("boom"), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, expected) in cases {
        let (status, _) = err.to_http_response_parts();
        assert_eq!(status, expected, "wrong status for {err}");
    }
}

#[test]
fn client_message_does_not_leak_internals() {
    let err = MaasError::database("SELECT * FROM api_keys exploded");
    assert_eq!(err.client_message(), "Internal server error");

    let err = MaasError::not_found("Team", "3f8a-secret-uuid");
    assert_eq!(err.client_message(), "Team not found");
}

#[test]
fn ensure_validation_macro_short_circuits() {
    fn check(limit: i32) -> crate::error::Result<()> {
        crate::ensure_validation!(limit > 0, "rate_limit must be positive");
        Ok(())
    }
    assert!(check(1).is_ok());
    let err = check(0).unwrap_err();
    assert!(matches!(err, MaasError::Validation { .. }));
}
