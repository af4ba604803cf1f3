//! # 身份中间件
//!
//! PEP是"调用者是谁"的唯一权威：这里只做头部归一化和粗粒度角色
//! 闸门，绝不复验bearer令牌。角色头可能是JSON数组、去引号的
//! 方括号列表或纯逗号列表，三种形式等价处理。

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::management::response;

/// PEP注入的身份头
pub const HEADER_USER_ID: &str = "X-MaaS-User-ID";
pub const HEADER_USER_EMAIL: &str = "X-MaaS-User-Email";
pub const HEADER_USER_ROLES: &str = "X-MaaS-User-Roles";

/// 角色常量
pub const ROLE_ADMIN: &str = "maas-admin";
pub const ROLE_USER: &str = "maas-user";

/// 认证上下文，由 `identity` 中间件注入请求扩展
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// 身份提供方的主体标识
    pub external_id: String,
    pub email: Option<String>,
    pub roles: HashSet<String>,
}

impl AuthContext {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(ROLE_ADMIN)
    }

    #[must_use]
    pub fn is_user_or_admin(&self) -> bool {
        self.roles.contains(ROLE_USER) || self.roles.contains(ROLE_ADMIN)
    }
}

/// 把角色头的三种形式归一化为集合
#[must_use]
pub fn parse_roles(raw: &str) -> HashSet<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return HashSet::new();
    }

    // JSON数组形式优先，如 ["maas-user","maas-admin"]
    if raw.starts_with('[') && raw.ends_with(']') {
        if let Ok(parsed) = serde_json::from_str::<Vec<String>>(raw) {
            return parsed
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }
        // 回退：剥掉方括号按逗号切分
        return split_comma_list(raw.trim_matches(['[', ']']));
    }

    split_comma_list(raw)
}

fn split_comma_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|r| r.trim().trim_matches('"').to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

/// 认证中间件：主体头为空直接401，否则注入 `AuthContext`
pub async fn identity(mut request: Request, next: Next) -> Response {
    let (external_id, email, roles) = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };

        let Some(external_id) = header(HEADER_USER_ID) else {
            return response::error_response(StatusCode::UNAUTHORIZED, "Authentication required");
        };

        let email = header(HEADER_USER_EMAIL);
        let roles = header(HEADER_USER_ROLES)
            .map(|raw| parse_roles(&raw))
            .unwrap_or_default();

        (external_id, email, roles)
    };

    let context = Arc::new(AuthContext {
        external_id,
        email,
        roles,
    });
    request.extensions_mut().insert(context);

    next.run(request).await
}

/// 角色闸门：需要 maas-user 或 maas-admin
pub async fn require_user_or_admin(request: Request, next: Next) -> Response {
    let Some(context) = request.extensions().get::<Arc<AuthContext>>() else {
        return response::error_response(StatusCode::UNAUTHORIZED, "Authentication required");
    };

    if !context.is_user_or_admin() {
        return response::error_response(
            StatusCode::FORBIDDEN,
            "Valid role required (maas-admin or maas-user)",
        );
    }

    next.run(request).await
}

/// 角色闸门：仅 maas-admin
pub async fn require_admin(request: Request, next: Next) -> Response {
    let Some(context) = request.extensions().get::<Arc<AuthContext>>() else {
        return response::error_response(StatusCode::UNAUTHORIZED, "Authentication required");
    };

    if !context.is_admin() {
        return response::error_response(StatusCode::FORBIDDEN, "Admin role required");
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array_roles() {
        let roles = parse_roles(r#"["maas-user","maas-admin"]"#);
        assert!(roles.contains("maas-user"));
        assert!(roles.contains("maas-admin"));
        assert_eq!(roles.len(), 2);
    }

    #[test]
    fn parses_bracketed_comma_list() {
        let roles = parse_roles(r#"[maas-user, "maas-admin"]"#);
        assert!(roles.contains("maas-user"));
        assert!(roles.contains("maas-admin"));
    }

    #[test]
    fn parses_plain_comma_list() {
        let roles = parse_roles("maas-user, maas-admin");
        assert!(roles.contains("maas-user"));
        assert!(roles.contains("maas-admin"));
    }

    #[test]
    fn empty_and_blank_roles() {
        assert!(parse_roles("").is_empty());
        assert!(parse_roles("   ").is_empty());
        assert!(parse_roles("[]").is_empty());
        assert!(parse_roles(",,").is_empty());
    }

    #[test]
    fn role_gates() {
        let admin = AuthContext {
            external_id: "u1".into(),
            email: None,
            roles: parse_roles("maas-admin"),
        };
        assert!(admin.is_admin());
        assert!(admin.is_user_or_admin());

        let user = AuthContext {
            external_id: "u2".into(),
            email: None,
            roles: parse_roles("maas-user"),
        };
        assert!(!user.is_admin());
        assert!(user.is_user_or_admin());

        let nobody = AuthContext {
            external_id: "u3".into(),
            email: None,
            roles: HashSet::new(),
        };
        assert!(!nobody.is_user_or_admin());
    }
}
