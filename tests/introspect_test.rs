//! 内省服务集成测试

use entity::api_keys::{self, KeyStatus};
use entity::team_memberships::MembershipRole;
use entity::users::UserKind;
use maas_api::introspect::Introspector;
use maas_api::keys::KeyOwner;
use maas_api::store::{NewTeam, Store};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, Set};

struct Fixture {
    store: Store,
    introspector: Introspector,
    team: entity::teams::Model,
    user: entity::users::Model,
}

async fn setup() -> Fixture {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect test db");
    Migrator::up(&db, None).await.expect("run migrations");
    let store = Store::new(db);

    let team = store
        .create_team(NewTeam {
            ext_id: "team-orange".to_string(),
            name: "Orange".to_string(),
            description: String::new(),
            rate_limit: 100,
            rate_window: "1m".to_string(),
        })
        .await
        .expect("create team");
    let user = store
        .create_user("idp-alice", Some("alice@example.com"), "Alice", UserKind::Human)
        .await
        .expect("create user");
    store
        .add_member(team.id, user.id, MembershipRole::Member)
        .await
        .expect("add member");

    Fixture {
        introspector: Introspector::new(store.clone()),
        store,
        team,
        user,
    }
}

#[tokio::test]
async fn happy_path_returns_full_claims() {
    let fx = setup().await;
    fx.store
        .create_grant(fx.team.id, None, "llama-3", "invoke")
        .await
        .unwrap();
    let (key, plaintext) = fx
        .store
        .create_key(fx.team.id, KeyOwner::User(fx.user.id), "k", None)
        .await
        .unwrap();

    let response = fx.introspector.introspect(&plaintext, None).await;
    assert!(response.active);
    assert_eq!(response.team_id.as_deref(), Some("team-orange"));
    assert_eq!(response.user_id, Some(fx.user.id.to_string()));
    assert_eq!(response.api_key_id, Some(key.id.to_string()));
    assert_eq!(response.plan.as_deref(), Some("100/1m"));
    assert_eq!(response.models_allowed, Some(vec!["llama-3".to_string()]));

    // groups 首元素必须是团队 ext_id，且恰好出现一次
    let groups = response.groups.expect("groups");
    let parts: Vec<&str> = groups.split(',').collect();
    assert_eq!(parts[0], "team-orange");
    assert_eq!(parts.iter().filter(|g| **g == "team-orange").count(), 1);
    assert!(parts.contains(&"role:member"));
}

#[tokio::test]
async fn tampered_token_is_inactive() {
    let fx = setup().await;
    let (_, plaintext) = fx
        .store
        .create_key(fx.team.id, KeyOwner::User(fx.user.id), "k", None)
        .await
        .unwrap();

    // 同前缀但尾部被改写
    let mut bytes = plaintext.clone().into_bytes();
    bytes[42] = if bytes[42] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(bytes).unwrap();

    let response = fx.introspector.introspect(&tampered, None).await;
    assert!(!response.active);
    assert!(response.team_id.is_none());
    assert!(response.user_id.is_none());

    // 恰好等于前缀的8字符令牌命中索引但哈希校验失败
    let response = fx.introspector.introspect(&plaintext[..8], None).await;
    assert!(!response.active);
}

#[tokio::test]
async fn short_and_unknown_tokens_are_inactive() {
    let fx = setup().await;

    assert!(!fx.introspector.introspect("", None).await.active);
    assert!(!fx.introspector.introspect("abc1234", None).await.active);
    assert!(
        !fx.introspector
            .introspect("AAAAAAAA_not_real", None)
            .await
            .active
    );
}

#[tokio::test]
async fn revoked_suspended_and_expired_keys_are_inactive() {
    let fx = setup().await;

    for status in [KeyStatus::Revoked, KeyStatus::Suspended] {
        let (key, plaintext) = fx
            .store
            .create_key(fx.team.id, KeyOwner::User(fx.user.id), "k", None)
            .await
            .unwrap();
        let mut active: api_keys::ActiveModel = key.into();
        active.status = Set(status);
        active
            .update(fx.store.connection())
            .await
            .expect("update status");

        let response = fx.introspector.introspect(&plaintext, None).await;
        assert!(!response.active, "status {status:?} must be inactive");
    }

    let expired_at = chrono::Utc::now() - chrono::Duration::hours(1);
    let (_, plaintext) = fx
        .store
        .create_key(
            fx.team.id,
            KeyOwner::User(fx.user.id),
            "k",
            Some(expired_at),
        )
        .await
        .unwrap();
    assert!(!fx.introspector.introspect(&plaintext, None).await.active);
}

#[tokio::test]
async fn team_service_key_requires_member_run_as() {
    let fx = setup().await;
    let (_, plaintext) = fx
        .store
        .create_key(fx.team.id, KeyOwner::TeamService, "ci", None)
        .await
        .unwrap();

    // 无 run_as → 拒绝
    assert!(!fx.introspector.introspect(&plaintext, None).await.active);

    // 非成员 run_as → 拒绝
    let outsider = fx
        .store
        .create_user("idp-mallory", None, "Mallory", UserKind::Human)
        .await
        .unwrap();
    let response = fx
        .introspector
        .introspect(&plaintext, Some(&outsider.id.to_string()))
        .await;
    assert!(!response.active);

    // 成员 run_as → 以该成员身份解析
    let response = fx
        .introspector
        .introspect(&plaintext, Some(&fx.user.id.to_string()))
        .await;
    assert!(response.active);
    assert_eq!(response.user_id, Some(fx.user.id.to_string()));

    // run_as 也接受身份提供方标识
    let response = fx.introspector.introspect(&plaintext, Some("idp-alice")).await;
    assert!(response.active);
}

#[tokio::test]
async fn introspection_touches_last_used_at() {
    let fx = setup().await;
    let (key, plaintext) = fx
        .store
        .create_key(fx.team.id, KeyOwner::User(fx.user.id), "k", None)
        .await
        .unwrap();
    assert!(key.last_used_at.is_none());

    assert!(fx.introspector.introspect(&plaintext, None).await.active);

    // last_used_at 异步刷新，轮询等待
    let mut updated = None;
    for _ in 0..50 {
        let current = fx
            .store
            .find_key_by_prefix(&key.key_prefix)
            .await
            .unwrap()
            .unwrap();
        if current.last_used_at.is_some() {
            updated = current.last_used_at;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(updated.is_some(), "last_used_at should be set eventually");
}
