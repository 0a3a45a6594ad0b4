//! Language model boundary
//!
//! The agent only needs "prompt in, text out". Providers implement
//! [`LanguageModel`]; the agent never inspects anything but the returned text.

pub mod gemini;
pub mod scripted;

pub use gemini::GeminiClient;
pub use scripted::ScriptedModel;

use crate::Result;
use async_trait::async_trait;

/// One completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    /// Generation stops before any of these strings
    pub stop: Vec<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            stop: Vec::new(),
        }
    }

    pub fn with_stop(mut self, stop: &str) -> Self {
        self.stop.push(stop.to_string());
        self
    }
}

/// Trait for text-completion providers
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
