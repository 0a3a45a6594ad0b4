//! Advisor service
//!
//! Long-lived collaborators (model, memory, fabric) shared by every request.
//! Each conversation turn gets a fresh agent and tool registry.

use crate::agent::AdvisorAgent;
use crate::classifier::IntentClassifier;
use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::fabric::{build_fabric_client, FabricClient};
use crate::llm::{GeminiClient, LanguageModel};
use crate::memory::{build_memory_store, MemoryStore};
use crate::models::{AgentOutcome, Intent, MemoryContext};
use crate::tools::create_default_registry;
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one conversation turn
#[derive(Debug, Clone)]
pub struct ConversationReply {
    pub intent: Intent,
    pub outcome: AgentOutcome,
}

pub struct AdvisorService {
    config: AdvisorConfig,
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    fabric: Arc<dyn FabricClient>,
}

impl AdvisorService {
    pub fn new(
        config: AdvisorConfig,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        fabric: Arc<dyn FabricClient>,
    ) -> Self {
        Self {
            config,
            model,
            memory,
            fabric,
        }
    }

    /// Wire up Gemini, the configured memory backend and the fabric client
    pub fn from_config(config: AdvisorConfig) -> Result<Self> {
        if config.gemini_api_key.is_empty() {
            warn!("GEMINI_API_KEY not set - model calls will fail");
        }

        let model: Arc<dyn LanguageModel> = Arc::new(GeminiClient::from_config(&config)?);
        let memory = build_memory_store(&config);
        let fabric = build_fabric_client(&config)?;

        Ok(Self::new(config, model, memory, fabric))
    }

    pub fn memory(&self) -> Arc<dyn MemoryStore> {
        self.memory.clone()
    }

    /// A new agent bound to a fresh tool registry
    pub fn build_agent(&self) -> AdvisorAgent {
        let registry =
            create_default_registry(&self.config, self.memory.clone(), self.fabric.clone());

        AdvisorAgent::new(
            self.config.clone(),
            self.model.clone(),
            registry,
            self.memory.clone(),
        )
    }

    /// Classify the input against the user's history, then run one agent turn
    pub async fn converse(&self, user_id: &str, input: &str) -> Result<ConversationReply> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(AdvisorError::InvalidRequest(
                "User ID is required".to_string(),
            ));
        }

        let context = match self.memory.load(user_id).await {
            Ok(context) => context,
            Err(error) => {
                warn!(
                    user_id = %user_id,
                    "Memory load failed, continuing without history: {}",
                    error
                );
                MemoryContext::default()
            }
        };

        let intent = IntentClassifier::detect(input, &context.chat_history(None));
        info!(user_id = %user_id, intent = %intent, "Routing conversation turn");

        let outcome = self
            .build_agent()
            .run_with_context(user_id, input, &context)
            .await?;

        Ok(ConversationReply { intent, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::StaticFabric;
    use crate::llm::ScriptedModel;
    use crate::memory::InMemoryMemoryStore;

    fn service(model: ScriptedModel) -> AdvisorService {
        AdvisorService::new(
            AdvisorConfig::default(),
            Arc::new(model),
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(StaticFabric::new("AAPL: 100")),
        )
    }

    #[tokio::test]
    async fn test_blank_user_is_rejected() {
        let service = service(ScriptedModel::new(["unused"]));
        let result = service.converse("  ", "hello").await;
        assert!(matches!(result, Err(AdvisorError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_intent_uses_history() {
        let service = service(ScriptedModel::new(["Noted.", "Here is the breakdown."]));

        let first = service
            .converse("u1", "what is my risk exposure and volatility?")
            .await
            .unwrap();
        assert_eq!(first.intent, Intent::RiskAnalysis);

        // nothing in this input on its own, the earlier turn decides
        let second = service.converse("u1", "tell me more").await.unwrap();
        assert_eq!(second.intent, Intent::RiskAnalysis);
        assert_eq!(second.outcome.output, "Here is the breakdown.");
    }

    #[tokio::test]
    async fn test_turns_are_persisted() {
        let service = service(ScriptedModel::new(["Hi there."]));
        tokio_test::assert_ok!(service.converse("u2", "hello").await);

        let context = service.memory().load("u2").await.unwrap();
        assert_eq!(context.turns.len(), 1);
        assert_eq!(context.turns[0].output_text, "Hi there.");
    }

    #[test]
    fn test_build_agent_registers_all_tools() {
        let service = service(ScriptedModel::new(["unused"]));
        assert_eq!(service.build_agent().registry().len(), 8);
    }
}
