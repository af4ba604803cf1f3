//! # 用量查询客户端
//!
//! 对时序后端的只读门面。每个指标发两条查询：区间增量的标量值
//! 和原始样本序列。鉴权令牌在进程启动时一次性读入。

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::PrometheusConfig;
use crate::error::{MaasError, Result};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};

/// 纳入汇总的限流器指标名
pub const USAGE_METRICS: [&str; 3] = ["authorized_calls", "limited_calls", "authorized_hits"];

/// 单个指标的汇总
#[derive(Debug, Clone, Serialize, Default)]
pub struct MetricUsage {
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sample_at: Option<DateTime<Utc>>,
}

/// 命名空间用量响应
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceUsage {
    pub namespace: String,
    pub range: String,
    pub metrics: BTreeMap<String, MetricUsage>,
    pub generated_at: DateTime<Utc>,
}

/// 时序后端查询响应（只解码关心的子集）
#[derive(Debug, Deserialize)]
struct PromResponse {
    status: String,
    #[serde(default)]
    data: PromData,
    #[serde(default, rename = "errorType")]
    error_type: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize, Default)]
struct PromData {
    #[serde(default)]
    result: Vec<SeriesEntry>,
}

#[derive(Debug, Deserialize, Clone)]
struct SeriesEntry {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    value: Vec<serde_json::Value>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// 带时间戳的采样点
#[derive(Debug, Clone, PartialEq)]
struct Sample {
    timestamp: DateTime<Utc>,
    value: f64,
}

/// 时序后端客户端
pub struct UsageClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    debug: bool,
}

impl UsageClient {
    /// 从配置构建；未配置地址时返回 None（用量端点整体禁用）
    pub fn from_config(cfg: &PrometheusConfig) -> Result<Option<Self>> {
        let Some(base_url) = cfg.base_url.as_deref() else {
            return Ok(None);
        };

        let token = std::fs::read_to_string(&cfg.token_path)
            .map_err(|e| {
                MaasError::server_init_with_source(
                    format!("无法读取时序后端令牌文件 {}", cfg.token_path),
                    e,
                )
            })?
            .trim()
            .to_string();

        let mut builder = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .danger_accept_invalid_certs(cfg.insecure_skip_verify);

        // CA文件可选：不存在时跳过，交由系统信任库
        match std::fs::read(&cfg.ca_path) {
            Ok(pem) => {
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    MaasError::server_init_with_source(
                        format!("解析CA证书失败 {}", cfg.ca_path),
                        e,
                    )
                })?;
                builder = builder.add_root_certificate(cert);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(MaasError::server_init_with_source(
                    format!("读取CA证书失败 {}", cfg.ca_path),
                    e,
                ));
            }
        }

        let client = builder
            .build()
            .map_err(|e| MaasError::server_init_with_source("构建时序后端客户端失败", e))?;

        Ok(Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            debug: cfg.debug,
        }))
    }

    /// 按限流命名空间汇总用量
    pub async fn namespace_usage(&self, namespace: &str, range: &str) -> Result<NamespaceUsage> {
        let mut metrics = BTreeMap::new();

        for metric_name in USAGE_METRICS {
            let total = self.query_increase(metric_name, namespace, range).await?;
            let samples = self.query_series(metric_name, namespace, range).await?;

            if self.debug {
                ldebug!(
                    "usage",
                    LogStage::ExternalApi,
                    LogComponent::Usage,
                    "metric_summary",
                    &format!(
                        "metric={metric_name} namespace={namespace} total={total:.3} samples={}",
                        samples.len()
                    )
                );
            }

            let mut usage = MetricUsage {
                total,
                ..MetricUsage::default()
            };
            if let Some(last) = samples.last() {
                usage.sample_count = Some(samples.len());
                usage.latest_value = Some(last.value);
                usage.last_sample_at = Some(last.timestamp);
            }
            metrics.insert(metric_name.to_string(), usage);
        }

        Ok(NamespaceUsage {
            namespace: namespace.to_string(),
            range: range.to_string(),
            metrics,
            generated_at: Utc::now(),
        })
    }

    async fn query_increase(&self, metric: &str, namespace: &str, range: &str) -> Result<f64> {
        let expr = format!("increase({metric}{{limitador_namespace=\"{namespace}\"}}[{range}])");
        let response = self.query(&expr).await?;
        match select_series_entry(&response.data.result, namespace) {
            Some(entry) => extract_vector_value(entry),
            None => Ok(0.0),
        }
    }

    async fn query_series(
        &self,
        metric: &str,
        namespace: &str,
        range: &str,
    ) -> Result<Vec<Sample>> {
        let expr = format!("{metric}{{limitador_namespace=\"{namespace}\"}}[{range}]");
        let response = self.query(&expr).await?;
        match select_series_entry(&response.data.result, namespace) {
            Some(entry) => extract_samples(entry),
            None => Ok(Vec::new()),
        }
    }

    async fn query(&self, expr: &str) -> Result<PromResponse> {
        let response = self
            .client
            .get(format!("{}/api/v1/query", self.base_url))
            .query(&[("query", expr)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MaasError::upstream(format!(
                "时序后端响应异常: HTTP {status}"
            )));
        }

        let parsed: PromResponse = response.json().await?;
        if parsed.status != "success" {
            return Err(MaasError::upstream(format!(
                "时序后端查询失败 ({}): {}",
                parsed.error_type, parsed.error
            )));
        }
        Ok(parsed)
    }
}

/// 优先取命名空间标签精确匹配的序列，仅一条时兜底使用
fn select_series_entry<'a>(entries: &'a [SeriesEntry], namespace: &str) -> Option<&'a SeriesEntry> {
    entries
        .iter()
        .find(|e| e.metric.get("limitador_namespace").map(String::as_str) == Some(namespace))
        .or(if entries.len() == 1 {
            entries.first()
        } else {
            None
        })
}

fn extract_vector_value(entry: &SeriesEntry) -> Result<f64> {
    if entry.value.len() != 2 {
        return Err(MaasError::upstream("时序后端返回了非预期的向量格式"));
    }
    to_float(&entry.value[1])
}

fn extract_samples(entry: &SeriesEntry) -> Result<Vec<Sample>> {
    let mut samples = Vec::with_capacity(entry.values.len());
    for pair in &entry.values {
        if pair.len() != 2 {
            continue;
        }
        let ts = to_float(&pair[0])?;
        let value = to_float(&pair[1])?;
        let secs = ts as i64;
        let nanos = ((ts - secs as f64) * 1_000_000_000.0) as u32;
        let timestamp = Utc
            .timestamp_opt(secs, nanos)
            .single()
            .ok_or_else(|| MaasError::upstream("时序后端返回了非法时间戳"))?;
        samples.push(Sample { timestamp, value });
    }
    Ok(samples)
}

fn to_float(value: &serde_json::Value) -> Result<f64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| MaasError::upstream("时序后端数值溢出")),
        serde_json::Value::String(s) => s
            .parse()
            .map_err(|_| MaasError::upstream("时序后端数值无法解析")),
        _ => Err(MaasError::upstream("时序后端返回了不支持的数值类型")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(json: serde_json::Value) -> SeriesEntry {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn vector_value_extraction() {
        let e = entry(serde_json::json!({
            "metric": {"limitador_namespace": "ns-a"},
            "value": [1717400000.0, "42.5"]
        }));
        assert_eq!(extract_vector_value(&e).unwrap(), 42.5);
    }

    #[test]
    fn samples_extraction_keeps_order() {
        let e = entry(serde_json::json!({
            "metric": {},
            "values": [[1717400000.0, "1"], [1717400030.5, "2.5"]]
        }));
        let samples = extract_samples(&e).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[1].value, 2.5);
        assert!(samples[0].timestamp < samples[1].timestamp);
    }

    #[test]
    fn series_selection_prefers_label_match() {
        let entries = vec![
            entry(serde_json::json!({"metric": {"limitador_namespace": "other"}, "value": []})),
            entry(serde_json::json!({"metric": {"limitador_namespace": "ns-a"}, "value": []})),
        ];
        let selected = select_series_entry(&entries, "ns-a").unwrap();
        assert_eq!(
            selected.metric.get("limitador_namespace").unwrap(),
            "ns-a"
        );
        // 多条且无匹配时不瞎选
        assert!(select_series_entry(&entries, "ns-x").is_none());
    }

    #[test]
    fn prom_error_payload_decodes() {
        let parsed: PromResponse = serde_json::from_value(serde_json::json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "invalid query"
        }))
        .unwrap();
        assert_eq!(parsed.status, "error");
        assert_eq!(parsed.error_type, "bad_data");
    }
}
