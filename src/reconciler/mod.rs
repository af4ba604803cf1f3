//! # 限流策略同步模块
//!
//! 数据库中的团队限流配置是事实来源；编排器里唯一一份
//! `TokenRateLimitPolicy` 文档是派生视图，最终一致。
//! 控制面变更后尽力同步，失败仅告警，由周期性重建收敛。

mod manager;
mod store;
mod types;

pub use manager::Reconciler;
pub use store::{HttpPolicyStore, MemoryPolicyStore, PolicyStore};
pub use types::{
    group_predicate, team_limit, CounterExpr, PolicyMetadata, PolicySpec, RateEntry, TeamLimit,
    TokenRateLimitPolicy, WhenPredicate, POLICY_KIND,
};
