//! Scripted model for development & testing
//!
//! Replays canned completions in order and records every prompt it saw.
//! Once the script runs out the last reply repeats.

use super::{CompletionRequest, LanguageModel};
use crate::error::AdvisorError;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

pub struct ScriptedModel {
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(replies.into_iter().map(|r| Reply::Text(r.into())).collect()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model that answers every call with the same text
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self::new([reply.into()])
    }

    /// A model whose every call fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Reply::Fail(message.into())])),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> crate::Result<String> {
        self.prompts.lock().await.push(request.prompt.clone());

        let next = self.script.lock().await.pop_front();
        let mut last = self.last.lock().await;

        let reply = match next {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last
                .clone()
                .ok_or_else(|| AdvisorError::LlmError("Scripted model has no replies".to_string()))?,
        };

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(message) => Err(AdvisorError::LlmError(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_then_repeats_last() {
        let model = ScriptedModel::new(["one", "two"]);
        let request = CompletionRequest::new("p", 0.0);

        assert_eq!(model.complete(&request).await.unwrap(), "one");
        assert_eq!(model.complete(&request).await.unwrap(), "two");
        assert_eq!(model.complete(&request).await.unwrap(), "two");
        assert_eq!(model.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_failing_model() {
        let model = ScriptedModel::failing("boom");
        let request = CompletionRequest::new("p", 0.0);
        assert!(model.complete(&request).await.is_err());
        assert!(model.complete(&request).await.is_err());
    }
}
