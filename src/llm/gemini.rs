//! Gemini API client
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{CompletionRequest, LanguageModel};
use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    max_output_tokens: i32,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", GEMINI_BASE_URL, model),
            max_output_tokens: 1024,
        })
    }

    pub fn from_config(config: &AdvisorConfig) -> crate::Result<Self> {
        Self::new(
            config.gemini_api_key.clone(),
            &config.gemini_model,
            config.model_timeout,
        )
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: self.max_output_tokens,
                stop_sequences: request.stop.clone(),
            },
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(AdvisorError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let body = self.build_request(request);

        debug!(prompt_chars = request.prompt.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                if e.is_timeout() {
                    AdvisorError::Timeout(format!("Gemini API: {}", e))
                } else {
                    AdvisorError::LlmError(format!("Gemini API error: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response ({}): {}", status, error_text);
            return Err(AdvisorError::LlmError(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AdvisorError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AdvisorError::LlmError("No response from Gemini API".to_string()))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AdvisorError::LlmError(
                "Empty response from Gemini".to_string(),
            ));
        }

        debug!(
            finish_reason = ?candidate.finish_reason,
            response_chars = text.len(),
            "Gemini response received"
        );

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(String::new(), "gemini-2.0-flash", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let request = CompletionRequest::new("What is my risk?", 0.1).with_stop("\nObservation:");
        let json = serde_json::to_value(client().build_request(&request)).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "What is my risk?");
        assert_eq!(json["generationConfig"]["stopSequences"][0], "\nObservation:");
        assert!(json["generationConfig"]["temperature"].as_f64().unwrap() < 0.2);
    }

    #[test]
    fn test_endpoint_uses_model() {
        assert!(client().endpoint.ends_with("/gemini-2.0-flash:generateContent"));
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Thought: fetch data"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10}
        }"#;

        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "Thought: fetch data");
        assert_eq!(parsed.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let result = client().complete(&CompletionRequest::new("hi", 0.1)).await;
        let error_msg = result.unwrap_err().to_string();
        assert!(error_msg.contains("GEMINI_API_KEY"));
    }
}
