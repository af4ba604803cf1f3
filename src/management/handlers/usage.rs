//! # 用量查询处理器

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;

use crate::config::is_valid_duration;
use crate::logging::{LogComponent, LogStage};
use crate::lwarn;
use crate::management::response;
use crate::management::server::AppState;

/// GET /usage 查询参数
#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub namespace: Option<String>,
    pub range: Option<String>,
}

/// GET /usage：按限流命名空间汇总
pub async fn namespace_usage(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Response {
    let Some(usage_client) = &state.usage else {
        return response::error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "usage backend is not configured",
        );
    };

    let Some(namespace) = query
        .namespace
        .as_deref()
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
    else {
        return response::error_response(
            StatusCode::BAD_REQUEST,
            "namespace query parameter is required",
        );
    };

    let range = query
        .range
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(&state.config.prometheus.default_range);
    if !is_valid_duration(range) {
        return response::error_response(
            StatusCode::BAD_REQUEST,
            "range must be a positive duration (e.g. 1m, 1h, 24h)",
        );
    }

    match usage_client.namespace_usage(namespace, range).await {
        Ok(usage) => {
            // 汇总样本尽力落库，供离线报表使用
            let store = state.store.clone();
            let samples: Vec<(String, f64)> = usage
                .metrics
                .iter()
                .map(|(name, metric)| (name.clone(), metric.total))
                .collect();
            let namespace = usage.namespace.clone();
            let generated_at = usage.generated_at;
            tokio::spawn(async move {
                for (metric, total) in samples {
                    if let Err(err) = store
                        .record_usage_sample(&namespace, &metric, total, generated_at)
                        .await
                    {
                        lwarn!(
                            "usage",
                            LogStage::Db,
                            LogComponent::Usage,
                            "sample_persist_fail",
                            &format!("Failed to persist usage sample {metric}: {err}")
                        );
                    }
                }
            });

            response::json_ok(usage)
        }
        Err(err) => response::app_error(err),
    }
}
