//! 策略同步器集成测试

use maas_api::reconciler::{
    group_predicate, MemoryPolicyStore, PolicyStore, Reconciler, TokenRateLimitPolicy,
};
use maas_api::store::{NewTeam, Store};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::sync::Arc;

const POLICY_NAME: &str = "gateway-token-rate-limits";

async fn setup() -> (Store, Arc<MemoryPolicyStore>, Reconciler) {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect test db");
    Migrator::up(&db, None).await.expect("run migrations");
    let store = Store::new(db);
    let policy_store = Arc::new(MemoryPolicyStore::new());
    let reconciler = Reconciler::new(
        store.clone(),
        policy_store.clone(),
        POLICY_NAME.to_string(),
        "llm".to_string(),
    );
    (store, policy_store, reconciler)
}

async fn read_policy(store: &MemoryPolicyStore) -> TokenRateLimitPolicy {
    store
        .get(POLICY_NAME)
        .await
        .expect("read policy")
        .expect("policy document exists")
}

#[tokio::test]
async fn upsert_creates_document_with_exact_predicate() {
    let (_, policy_store, reconciler) = setup().await;

    reconciler.upsert("team-orange", 100, "1m").await.unwrap();

    let policy = read_policy(&policy_store).await;
    assert_eq!(policy.kind, "TokenRateLimitPolicy");
    let entry = policy.spec.limits.get("team-orange").expect("entry");
    assert_eq!(entry.rates[0].limit, 100);
    assert_eq!(entry.rates[0].window, "1m");
    assert_eq!(entry.when[0].predicate, group_predicate("team-orange"));
    assert!(entry.when[0].predicate.contains("g == \"team-orange\""));
    assert_eq!(entry.counters[0].expression, "auth.identity.userid");
}

#[tokio::test]
async fn upsert_replaces_existing_entry() {
    let (_, policy_store, reconciler) = setup().await;

    reconciler.upsert("team-y", 10, "1m").await.unwrap();
    reconciler.upsert("team-y", 20, "5m").await.unwrap();

    let policy = read_policy(&policy_store).await;
    let entry = policy.spec.limits.get("team-y").expect("entry");
    assert_eq!(entry.rates.len(), 1);
    assert_eq!(entry.rates[0].limit, 20);
    assert_eq!(entry.rates[0].window, "5m");
}

#[tokio::test]
async fn patch_roundtrip_restores_document() {
    let (_, policy_store, reconciler) = setup().await;

    reconciler.upsert("team-r", 10, "1m").await.unwrap();
    let before = read_policy(&policy_store).await;

    reconciler.upsert("team-r", 20, "5m").await.unwrap();
    reconciler.upsert("team-r", 10, "1m").await.unwrap();
    let after = read_policy(&policy_store).await;

    // 除版本元数据外逐字节一致
    assert_eq!(before.spec, after.spec);
    assert_ne!(
        before.metadata.resource_version,
        after.metadata.resource_version
    );
}

#[tokio::test]
async fn remove_drops_only_that_entry() {
    let (_, policy_store, reconciler) = setup().await;

    reconciler.upsert("team-a", 10, "1m").await.unwrap();
    reconciler.upsert("team-b", 20, "1h").await.unwrap();
    reconciler.remove("team-a").await.unwrap();

    let policy = read_policy(&policy_store).await;
    assert!(!policy.spec.limits.contains_key("team-a"));
    assert!(policy.spec.limits.contains_key("team-b"));

    // 幂等：再删一次不报错
    reconciler.remove("team-a").await.unwrap();
}

#[tokio::test]
async fn rebuild_projects_all_teams_and_heals_drift() {
    let (store, policy_store, reconciler) = setup().await;

    for (ext_id, name, limit, window) in [
        ("team-1", "One", 10, "1m"),
        ("team-2", "Two", 200, "1h"),
    ] {
        store
            .create_team(NewTeam {
                ext_id: ext_id.to_string(),
                name: name.to_string(),
                description: String::new(),
                rate_limit: limit,
                rate_window: window.to_string(),
            })
            .await
            .unwrap();
    }

    // 制造漂移：文档里有一个数据库中不存在的团队
    reconciler.upsert("team-ghost", 1, "1s").await.unwrap();

    reconciler.rebuild().await.unwrap();

    let policy = read_policy(&policy_store).await;
    assert_eq!(policy.spec.limits.len(), 2);
    assert!(policy.spec.limits.contains_key("team-1"));
    assert!(policy.spec.limits.contains_key("team-2"));
    assert!(!policy.spec.limits.contains_key("team-ghost"));
    assert_eq!(policy.spec.limits["team-2"].rates[0].limit, 200);
}

#[tokio::test]
async fn concurrent_upserts_converge() {
    let (_, policy_store, reconciler) = setup().await;
    let reconciler = Arc::new(reconciler);

    let mut handles = Vec::new();
    for i in 0..8 {
        let reconciler = reconciler.clone();
        handles.push(tokio::spawn(async move {
            reconciler
                .upsert(&format!("team-{i}"), 10 + i, "1m")
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let policy = read_policy(&policy_store).await;
    assert_eq!(policy.spec.limits.len(), 8);
}
