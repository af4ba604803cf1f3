//! 控制面HTTP端到端测试
//!
//! 通过完整路由栈（身份中间件 + 角色闸门 + 处理器）驱动，
//! 策略文档落在内存存储中以便断言。

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use maas_api::config::{AppConfig, OrchestratorConfig, PrometheusConfig};
use maas_api::management::routes::create_routes;
use maas_api::management::server::AppState;
use maas_api::reconciler::{MemoryPolicyStore, PolicyStore, Reconciler};
use maas_api::store::Store;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const POLICY_NAME: &str = "gateway-token-rate-limits";

struct TestApp {
    router: Router,
    store: Store,
    policy_store: Arc<MemoryPolicyStore>,
}

fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        service_name: "maas-api-test".into(),
        database_url: "sqlite::memory:".into(),
        key_namespace: "llm".into(),
        create_default_team: false,
        admin_api_key: None,
        default_rate_limit: 100,
        default_rate_window: "1m".into(),
        reconcile_interval_secs: 0,
        debug: false,
        orchestrator: OrchestratorConfig {
            base_url: None,
            token_path: "/tmp/token".into(),
            policy_name: POLICY_NAME.into(),
        },
        prometheus: PrometheusConfig {
            base_url: None,
            token_path: "/tmp/token".into(),
            ca_path: "/tmp/ca.crt".into(),
            insecure_skip_verify: false,
            timeout_secs: 10,
            default_range: "24h".into(),
            debug: false,
        },
    }
}

async fn setup_app() -> TestApp {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect test db");
    Migrator::up(&db, None).await.expect("run migrations");
    let store = Store::new(db);

    let policy_store = Arc::new(MemoryPolicyStore::new());
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        policy_store.clone(),
        POLICY_NAME.to_string(),
        "llm".to_string(),
    ));

    let state = AppState::new(Arc::new(test_config()), store.clone(), reconciler, None);
    TestApp {
        router: create_routes(state),
        store,
        policy_store,
    }
}

/// 构造带PEP身份头的请求
fn authed(method: Method, uri: &str, subject: &str, roles: &str, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-MaaS-User-ID", subject)
        .header("X-MaaS-User-Email", format!("{subject}@example.com"));
    if !roles.is_empty() {
        builder = builder.header("X-MaaS-User-Roles", roles);
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_team(app: &TestApp, ext_id: &str, name: &str, limit: i64, window: &str) -> Value {
    let (status, body) = send(
        &app.router,
        authed(
            Method::POST,
            "/teams",
            "idp-admin",
            "maas-user",
            Some(json!({
                "ext_id": ext_id,
                "name": name,
                "rate_limit": limit,
                "rate_window": window,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create team failed: {body}");
    body
}

#[tokio::test]
async fn health_is_anonymous() {
    let app = setup_app().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn identity_and_role_gates() {
    let app = setup_app().await;

    // 无身份头 → 401
    let request = Request::builder()
        .uri("/teams")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 有主体但无角色 → 403
    let (status, _) = send(
        &app.router,
        authed(Method::GET, "/teams", "idp-nobody", "", None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // JSON数组角色头等价生效
    let (status, _) = send(
        &app.router,
        authed(
            Method::GET,
            "/teams",
            "idp-user",
            r#"["maas-user"]"#,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn happy_path_inference_flow() {
    let app = setup_app().await;
    create_team(&app, "team-orange", "Orange", 100, "1m").await;

    let user = app
        .store
        .create_user(
            "idp-alice",
            Some("alice@example.com"),
            "Alice",
            entity::users::UserKind::Human,
        )
        .await
        .unwrap();

    // 为用户签发团队密钥
    let (status, minted) = send(
        &app.router,
        authed(
            Method::POST,
            "/teams/team-orange/keys",
            "idp-admin",
            "maas-user",
            Some(json!({"user_id": user.id, "alias": "laptop"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let plaintext = minted["api_key"].as_str().expect("plaintext in response");
    assert_eq!(plaintext.len(), 43);
    assert_eq!(minted["key_prefix"], &plaintext[..8]);

    // 表单体内省
    let request = Request::builder()
        .method(Method::POST)
        .uri("/introspect")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("token={plaintext}")))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);
    assert_eq!(body["team_id"], "team-orange");
    assert_eq!(body["user_id"], user.id.to_string());
    let groups = body["groups"].as_str().unwrap();
    assert!(groups.starts_with("team-orange"));
}

#[tokio::test]
async fn unknown_prefix_introspection_is_inactive_200() {
    let app = setup_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/introspect")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("token=AAAAAAAA_not_real"))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"active": false}));

    // 7字符令牌同样只是 inactive
    let request = Request::builder()
        .method(Method::POST)
        .uri("/introspect")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("token=abc1234"))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    // 完全取不到 token 才是 400
    let request = Request::builder()
        .method(Method::POST)
        .uri("/introspect")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn team_creation_projects_policy_document() {
    let app = setup_app().await;
    create_team(&app, "team-green", "Green", 50, "1h").await;

    let policy = app
        .policy_store
        .get(POLICY_NAME)
        .await
        .unwrap()
        .expect("policy document created");
    let entry = policy.spec.limits.get("team-green").expect("entry");
    assert_eq!(entry.rates[0].limit, 50);
    assert_eq!(entry.rates[0].window, "1h");
    assert!(entry.when[0].predicate.contains("g == \"team-green\""));
}

#[tokio::test]
async fn patch_updates_policy_document() {
    let app = setup_app().await;
    create_team(&app, "team-y", "Yankee", 10, "1m").await;

    let (status, _) = send(
        &app.router,
        authed(
            Method::PATCH,
            "/teams/team-y",
            "idp-admin",
            "maas-user",
            Some(json!({"rate_limit": 20, "rate_window": "5m"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let policy = app.policy_store.get(POLICY_NAME).await.unwrap().unwrap();
    let entry = policy.spec.limits.get("team-y").expect("entry");
    assert_eq!(entry.rates[0].limit, 20);
    assert_eq!(entry.rates[0].window, "5m");
    assert!(entry.when[0].predicate.contains("g == \"team-y\""));
}

#[tokio::test]
async fn cascade_delete_flow() {
    let app = setup_app().await;
    let team_body = create_team(&app, "team-x", "Xray", 100, "1m").await;
    let team_id = team_body["id"].as_str().unwrap().to_string();

    let alice = app
        .store
        .create_user("idp-a", None, "A", entity::users::UserKind::Human)
        .await
        .unwrap();
    let bob = app
        .store
        .create_user("idp-b", None, "B", entity::users::UserKind::Human)
        .await
        .unwrap();
    let team_uuid = uuid::Uuid::parse_str(&team_id).unwrap();
    app.store
        .add_member(
            team_uuid,
            alice.id,
            entity::team_memberships::MembershipRole::Owner,
        )
        .await
        .unwrap();
    app.store
        .add_member(
            team_uuid,
            bob.id,
            entity::team_memberships::MembershipRole::Member,
        )
        .await
        .unwrap();
    for _ in 0..3 {
        app.store
            .create_key(team_uuid, maas_api::keys::KeyOwner::User(alice.id), "k", None)
            .await
            .unwrap();
    }

    let (status, body) = send(
        &app.router,
        authed(Method::DELETE, "/teams/team-x", "idp-admin", "maas-user", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cascaded_key_count"], 3);

    // 团队已消失
    let (status, _) = send(
        &app.router,
        authed(Method::GET, "/teams/team-x", "idp-admin", "maas-user", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 策略文档条目已移除
    let policy = app.policy_store.get(POLICY_NAME).await.unwrap().unwrap();
    assert!(!policy.spec.limits.contains_key("team-x"));
}

#[tokio::test]
async fn me_alias_and_cross_user_access() {
    let app = setup_app().await;
    create_team(&app, "team-home", "Home", 100, "1m").await;

    // /profile 引导出请求者用户
    let (status, profile) = send(
        &app.router,
        authed(Method::GET, "/profile", "idp-self", "maas-user", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let self_id = uuid::Uuid::parse_str(profile["id"].as_str().unwrap()).unwrap();

    let team = app.store.get_team_by_ext_id("team-home").await.unwrap().unwrap();
    app.store
        .add_member(
            team.id,
            self_id,
            entity::team_memberships::MembershipRole::Member,
        )
        .await
        .unwrap();

    // me 别名签发的密钥归属请求者本人
    let (status, minted) = send(
        &app.router,
        authed(
            Method::POST,
            "/users/me/keys",
            "idp-self",
            "maas-user",
            Some(json!({"alias": "cli"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "mint via me failed: {minted}");
    assert_eq!(minted["user_id"], self_id.to_string());

    // GET /users/me/keys 返回自己的密钥
    let (status, listed) = send(
        &app.router,
        authed(Method::GET, "/users/me/keys", "idp-self", "maas-user", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total_keys"], 1);
    assert!(listed["keys"][0]["key_hash"].is_null(), "hash must not leak");
    assert!(listed["keys"][0]["salt"].is_null(), "salt must not leak");

    // 非管理员跨用户 → 403
    let other = app
        .store
        .create_user("idp-other", None, "Other", entity::users::UserKind::Human)
        .await
        .unwrap();
    let (status, _) = send(
        &app.router,
        authed(
            Method::POST,
            &format!("/users/{}/keys", other.id),
            "idp-self",
            "maas-user",
            Some(json!({"alias": "sneaky", "team_id": "team-home"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app.router,
        authed(
            Method::GET,
            &format!("/users/{}/keys", other.id),
            "idp-self",
            "maas-user",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 管理员可以跨用户
    let (status, _) = send(
        &app.router,
        authed(
            Method::POST,
            &format!("/users/{}/keys", other.id),
            "idp-root",
            "maas-admin",
            Some(json!({"alias": "issued", "team_id": "team-home"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn validation_boundaries_and_conflicts() {
    let app = setup_app().await;

    // rate_limit = 0 → 400
    let (status, _) = send(
        &app.router,
        authed(
            Method::POST,
            "/teams",
            "idp-admin",
            "maas-user",
            Some(json!({"ext_id": "team-bad", "name": "Bad", "rate_limit": 0})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 非法窗口 → 400
    let (status, _) = send(
        &app.router,
        authed(
            Method::POST,
            "/teams",
            "idp-admin",
            "maas-user",
            Some(json!({"ext_id": "team-bad", "name": "Bad", "rate_window": "soon"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 重复 ext_id → 409，响应体是 {"error": ...}
    create_team(&app, "team-dup", "Dup", 100, "1m").await;
    let (status, body) = send(
        &app.router,
        authed(
            Method::POST,
            "/teams",
            "idp-admin",
            "maas-user",
            Some(json!({"ext_id": "team-dup", "name": "Dup Two"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn delete_key_by_prefix_flow() {
    let app = setup_app().await;
    create_team(&app, "team-k", "Kilo", 100, "1m").await;

    let (_, minted) = send(
        &app.router,
        authed(
            Method::POST,
            "/teams/team-k/keys",
            "idp-admin",
            "maas-user",
            Some(json!({"alias": "ci"})),
        ),
    )
    .await;
    let prefix = minted["key_prefix"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        authed(
            Method::DELETE,
            &format!("/keys/{prefix}"),
            "idp-admin",
            "maas-user",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "delete failed: {body}");
    assert_eq!(body["key_prefix"], prefix.as_str());

    // 列表不再包含
    let (_, listed) = send(
        &app.router,
        authed(Method::GET, "/teams/team-k/keys", "idp-admin", "maas-user", None),
    )
    .await;
    assert_eq!(listed["total_keys"], 0);

    // 再删 → 404
    let (status, _) = send(
        &app.router,
        authed(
            Method::DELETE,
            &format!("/keys/{prefix}"),
            "idp-admin",
            "maas-user",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grants_and_models_listing() {
    let app = setup_app().await;
    create_team(&app, "team-g", "Golf", 100, "1m").await;

    let (status, grant) = send(
        &app.router,
        authed(
            Method::POST,
            "/teams/team-g/grants",
            "idp-admin",
            "maas-user",
            Some(json!({"model_id": "llama-3", "role": "invoke"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(grant["user_id"].is_null());

    // 重复授权 → 409
    let (status, _) = send(
        &app.router,
        authed(
            Method::POST,
            "/teams/team-g/grants",
            "idp-admin",
            "maas-user",
            Some(json!({"model_id": "llama-3"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 隐式补建的模型出现在目录里
    let (status, models) = send(
        &app.router,
        authed(Method::GET, "/models", "idp-admin", "maas-user", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(models["total"], 1);
    assert_eq!(models["models"][0]["name"], "llama-3");
}

#[tokio::test]
async fn usage_endpoint_reports_unconfigured_backend() {
    let app = setup_app().await;

    let (status, _) = send(
        &app.router,
        authed(
            Method::GET,
            "/usage?namespace=team-a",
            "idp-admin",
            "maas-user",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // 后端未配置的判定先于参数校验
    let (status, _) = send(
        &app.router,
        authed(Method::GET, "/usage", "idp-admin", "maas-user", None),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
