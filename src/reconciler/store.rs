//! # 策略文档存储
//!
//! 编排器作为策略文档的带版本对象存储。`put` 以 resourceVersion
//! 做乐观并发：过期版本返回冲突，调用方重读重试。

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::types::TokenRateLimitPolicy;
use crate::error::{MaasError, Result};

/// 策略文档的读写抽象
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// 读取命名文档，不存在返回 None
    async fn get(&self, name: &str) -> Result<Option<TokenRateLimitPolicy>>;

    /// 写入文档：无 resourceVersion 视为创建，有则按版本替换；
    /// 版本过期返回 `Conflict`
    async fn put(&self, policy: &TokenRateLimitPolicy) -> Result<TokenRateLimitPolicy>;
}

/// 通过编排器REST API读写文档
pub struct HttpPolicyStore {
    client: reqwest::Client,
    base_url: String,
    namespace: String,
    token: String,
}

impl HttpPolicyStore {
    /// 启动时构建：读入服务账号令牌，失败即致命
    pub fn new(base_url: &str, namespace: &str, token_path: &str) -> Result<Self> {
        let token = std::fs::read_to_string(token_path)
            .map_err(|e| {
                MaasError::server_init_with_source(
                    format!("无法读取编排器令牌文件 {token_path}"),
                    e,
                )
            })?
            .trim()
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MaasError::server_init_with_source("构建编排器HTTP客户端失败", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            namespace: namespace.to_string(),
            token,
        })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/apis/kuadrant.io/v1alpha1/namespaces/{}/tokenratelimitpolicies",
            self.base_url, self.namespace
        )
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.collection_url(), name)
    }
}

#[async_trait]
impl PolicyStore for HttpPolicyStore {
    async fn get(&self, name: &str) -> Result<Option<TokenRateLimitPolicy>> {
        let response = self
            .client
            .get(self.resource_url(name))
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(MaasError::upstream(format!(
                "读取策略文档失败: HTTP {status}"
            ))),
        }
    }

    async fn put(&self, policy: &TokenRateLimitPolicy) -> Result<TokenRateLimitPolicy> {
        let request = if policy.metadata.resource_version.is_none() {
            self.client.post(self.collection_url())
        } else {
            self.client.put(self.resource_url(&policy.metadata.name))
        };

        let response = request.bearer_auth(&self.token).json(policy).send().await?;

        match response.status() {
            StatusCode::CONFLICT => Err(MaasError::conflict(
                "Policy document",
                &policy.metadata.name,
            )),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(MaasError::upstream(format!(
                "写入策略文档失败: HTTP {status}"
            ))),
        }
    }
}

/// 内存实现，测试与本地开发用；同样模拟版本乐观并发
#[derive(Default)]
pub struct MemoryPolicyStore {
    documents: Mutex<HashMap<String, TokenRateLimitPolicy>>,
    version: Mutex<u64>,
}

impl MemoryPolicyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get(&self, name: &str) -> Result<Option<TokenRateLimitPolicy>> {
        Ok(self.documents.lock().unwrap().get(name).cloned())
    }

    async fn put(&self, policy: &TokenRateLimitPolicy) -> Result<TokenRateLimitPolicy> {
        let mut documents = self.documents.lock().unwrap();
        let current = documents.get(&policy.metadata.name);

        let current_version = current.and_then(|p| p.metadata.resource_version.clone());
        if current_version != policy.metadata.resource_version {
            return Err(MaasError::conflict(
                "Policy document",
                &policy.metadata.name,
            ));
        }

        let mut version = self.version.lock().unwrap();
        *version += 1;
        let mut stored = policy.clone();
        stored.metadata.resource_version = Some(version.to_string());
        documents.insert(policy.metadata.name.clone(), stored.clone());
        Ok(stored)
    }
}
