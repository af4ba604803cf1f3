//! # TokenRateLimitPolicy 文档类型
//!
//! 文档按团队 ext_id 建键；限流器通过 CEL 谓词匹配 groups 声明，
//! 计数器按 `auth.identity.userid` 区分。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const POLICY_API_VERSION: &str = "kuadrant.io/v1alpha1";
pub const POLICY_KIND: &str = "TokenRateLimitPolicy";

/// 策略文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRateLimitPolicy {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: PolicyMetadata,
    pub spec: PolicySpec,
}

/// 文档元数据，resourceVersion 承载乐观并发
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PolicyMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "resourceVersion", skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// 策略规格：limits 以团队 ext_id 为键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PolicySpec {
    #[serde(default)]
    pub limits: BTreeMap<String, TeamLimit>,
}

/// 单个团队的限流条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLimit {
    pub rates: Vec<RateEntry>,
    pub when: Vec<WhenPredicate>,
    pub counters: Vec<CounterExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEntry {
    pub limit: i32,
    pub window: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhenPredicate {
    pub predicate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterExpr {
    pub expression: String,
}

impl TokenRateLimitPolicy {
    /// 空文档骨架
    #[must_use]
    pub fn empty(name: &str, namespace: &str) -> Self {
        Self {
            api_version: POLICY_API_VERSION.to_string(),
            kind: POLICY_KIND.to_string(),
            metadata: PolicyMetadata {
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
                resource_version: None,
            },
            spec: PolicySpec::default(),
        }
    }
}

/// 团队的 groups 匹配谓词，文本必须与限流器约定逐字一致
#[must_use]
pub fn group_predicate(ext_id: &str) -> String {
    format!("auth.identity.groups.split(\",\").exists(g, g == \"{ext_id}\")")
}

/// 由团队配置投影出策略条目
#[must_use]
pub fn team_limit(ext_id: &str, rate_limit: i32, rate_window: &str) -> TeamLimit {
    TeamLimit {
        rates: vec![RateEntry {
            limit: rate_limit,
            window: rate_window.to_string(),
        }],
        when: vec![WhenPredicate {
            predicate: group_predicate(ext_id),
        }],
        counters: vec![CounterExpr {
            expression: "auth.identity.userid".to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_text_is_exact() {
        assert_eq!(
            group_predicate("team-orange"),
            "auth.identity.groups.split(\",\").exists(g, g == \"team-orange\")"
        );
    }

    #[test]
    fn team_limit_projection() {
        let entry = team_limit("team-a", 20, "5m");
        assert_eq!(entry.rates.len(), 1);
        assert_eq!(entry.rates[0].limit, 20);
        assert_eq!(entry.rates[0].window, "5m");
        assert_eq!(entry.counters[0].expression, "auth.identity.userid");
        assert!(entry.when[0].predicate.contains("g == \"team-a\""));
    }

    #[test]
    fn document_serializes_with_k8s_field_names() {
        let mut policy = TokenRateLimitPolicy::empty("gateway-token-rate-limits", "llm");
        policy.metadata.resource_version = Some("7".to_string());
        policy
            .spec
            .limits
            .insert("team-a".to_string(), team_limit("team-a", 10, "1m"));

        let value = serde_json::to_value(&policy).unwrap();
        assert_eq!(value["apiVersion"], "kuadrant.io/v1alpha1");
        assert_eq!(value["kind"], "TokenRateLimitPolicy");
        assert_eq!(value["metadata"]["resourceVersion"], "7");
        assert_eq!(value["spec"]["limits"]["team-a"]["rates"][0]["limit"], 10);
    }
}
