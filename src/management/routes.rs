//! # 路由配置
//!
//! /health 与 /introspect 匿名（内省仅经内部网络由PEP访问），
//! 其余路由都在身份中间件与 user_or_admin 闸门之后。

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};

use crate::management::middleware::auth::{identity, require_user_or_admin};
use crate::management::server::AppState;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route(
            "/health",
            get(crate::management::handlers::health::health_check),
        )
        .route(
            "/introspect",
            post(crate::management::handlers::introspect::introspect),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/profile",
            get(crate::management::handlers::identity::profile),
        )
        .nest("/teams", team_routes())
        .nest("/users", user_routes())
        .route(
            "/keys/{key_prefix}",
            delete(crate::management::handlers::keys::delete_key),
        )
        .route(
            "/models",
            get(crate::management::handlers::models::list_models),
        )
        .route(
            "/usage",
            get(crate::management::handlers::usage::namespace_usage),
        )
        .with_state(state.clone())
        .route_layer(middleware::from_fn::<_, (axum::extract::Request,)>(
            require_user_or_admin,
        ))
        .route_layer(middleware::from_fn::<_, (axum::extract::Request,)>(
            identity,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// 团队管理路由
fn team_routes() -> Router<AppState> {
    use axum::routing::patch;
    Router::new()
        .route("/", get(crate::management::handlers::teams::list_teams))
        .route("/", post(crate::management::handlers::teams::create_team))
        .route(
            "/{team_ref}",
            get(crate::management::handlers::teams::get_team),
        )
        .route(
            "/{team_ref}",
            patch(crate::management::handlers::teams::update_team),
        )
        .route(
            "/{team_ref}",
            delete(crate::management::handlers::teams::delete_team),
        )
        // 成员管理
        .route(
            "/{team_ref}/members",
            post(crate::management::handlers::teams::add_team_member),
        )
        .route(
            "/{team_ref}/members",
            get(crate::management::handlers::teams::list_team_members),
        )
        .route(
            "/{team_ref}/members/{user_id}",
            delete(crate::management::handlers::teams::remove_team_member),
        )
        // 模型授权
        .route(
            "/{team_ref}/grants",
            post(crate::management::handlers::teams::create_model_grant),
        )
        // 团队级密钥
        .route(
            "/{team_ref}/keys",
            post(crate::management::handlers::keys::create_team_key),
        )
        .route(
            "/{team_ref}/keys",
            get(crate::management::handlers::keys::list_team_keys),
        )
}

/// 用户密钥路由，路径参数接受 "me"
fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{user_ref}/keys",
            post(crate::management::handlers::keys::create_user_key),
        )
        .route(
            "/{user_ref}/keys",
            get(crate::management::handlers::keys::list_user_keys),
        )
}
