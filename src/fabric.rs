//! Fabric data service
//!
//! Raw client portfolio facts come from an external retrieval service that
//! answers natural-language prompts with text.

use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

#[async_trait]
pub trait FabricClient: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String>;
}

/// HTTP-backed fabric client. POSTs `{"prompt": ...}` to `<base>/query` and
/// accepts either a JSON body with an `answer` field or plain text.
#[derive(Clone)]
pub struct HttpFabricClient {
    client: Client,
    base_url: String,
}

impl HttpFabricClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FabricClient for HttpFabricClient {
    async fn query(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/query", self.base_url);
        debug!(url = %url, "Querying fabric");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| {
                error!("Fabric request failed: {}", e);
                if e.is_timeout() {
                    AdvisorError::Timeout(format!("Fabric query: {}", e))
                } else {
                    AdvisorError::FabricError(format!("Fabric request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AdvisorError::FabricError(format!(
                "Fabric returned {}: {}",
                status, body
            )));
        }

        Ok(extract_answer(&body))
    }
}

fn extract_answer(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("answer") {
            Some(Value::String(answer)) => answer.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Ok(Value::String(answer)) => answer,
        _ => body.to_string(),
    }
}

/// Used when no fabric endpoint is configured. Every query fails, which the
/// stock-positioning tool reports as an error payload.
pub struct UnconfiguredFabric;

#[async_trait]
impl FabricClient for UnconfiguredFabric {
    async fn query(&self, _prompt: &str) -> Result<String> {
        Err(AdvisorError::ConfigError(
            "FABRIC_BASE_URL is not configured".to_string(),
        ))
    }
}

/// Fabric double that answers every prompt with the same text and counts calls
pub struct StaticFabric {
    answer: String,
    calls: AtomicUsize,
}

impl StaticFabric {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FabricClient for StaticFabric {
    async fn query(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

pub fn build_fabric_client(config: &AdvisorConfig) -> Result<Arc<dyn FabricClient>> {
    match config.fabric_base_url.as_deref() {
        Some(url) => Ok(Arc::new(HttpFabricClient::new(url, config.tool_timeout)?)),
        None => Ok(Arc::new(UnconfiguredFabric)),
    }
}
