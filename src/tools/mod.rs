//! Tool trait and registry
//!
//! Tools take the raw `Action Input` string and always return a
//! [`ToolOutcome`]. Failures are values, never errors, so the agent loop only
//! ever sees an observation with a `status` field.

pub mod advisory;
pub mod portfolio;

use crate::config::AdvisorConfig;
use crate::fabric::FabricClient;
use crate::memory::MemoryStore;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use advisory::{AskFinancialGoalTool, CannedResponseTool, HandleFeedbackTool};
pub use portfolio::{CalculateInvestmentPlanTool, GetStockPositioningTool};

pub const ASK_INITIAL_QUESTION: &str = "Ask Initial Question";
pub const GET_STOCK_POSITIONING: &str = "Get Stock Positioning";
pub const ASK_FINANCIAL_GOAL: &str = "Ask Financial Goal";
pub const CALCULATE_RISK: &str = "Calculate Risk";
pub const SUGGEST_RISK_PLAN: &str = "Suggest Risk Plan";
pub const CALCULATE_INVESTMENT_PLAN: &str = "Calculate Investment Plan";
pub const SUGGEST_INVESTMENT_PLAN: &str = "Suggest Investment Plan";
pub const HANDLE_FEEDBACK: &str = "Handle Feedback";

/// Result of one tool invocation. Rendered as a JSON object whose `status`
/// is `"success"` or `"error"`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success {
        payload: Map<String, Value>,
    },
    Failure {
        message: String,
        payload: Map<String, Value>,
    },
}

impl ToolOutcome {
    /// Success carrying the fields of `payload`. Non-object payloads are
    /// stored under `result`.
    pub fn success(payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        ToolOutcome::Success { payload }
    }

    /// Success carrying a user-facing message
    pub fn message(text: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("message".to_string(), Value::String(text.into()));
        ToolOutcome::Success { payload }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ToolOutcome::Failure {
            message: message.into(),
            payload: Map::new(),
        }
    }

    /// Attach an extra top-level field
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        match &mut self {
            ToolOutcome::Success { payload } | ToolOutcome::Failure { payload, .. } => {
                payload.insert(key.to_string(), value);
            }
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        match self {
            ToolOutcome::Success { payload } => {
                object.insert("status".to_string(), Value::from("success"));
                object.extend(payload.clone());
            }
            ToolOutcome::Failure { message, payload } => {
                object.insert("status".to_string(), Value::from("error"));
                object.insert("message".to_string(), Value::from(message.as_str()));
                object.extend(payload.clone());
            }
        }
        Value::Object(object)
    }

    /// The observation string fed back to the model
    pub fn to_json_string(&self) -> String {
        self.to_value().to_string()
    }
}

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Shown to the model; never interpreted by code
    fn description(&self) -> &'static str;

    /// Whether `Action Input` must be a JSON document. Non-JSON input for
    /// such tools is wrapped as `{"user_input": ...}` before invocation.
    fn expects_json(&self) -> bool {
        false
    }

    async fn invoke(&self, input: &str) -> ToolOutcome;
}

/// Tool registry. Registration order is kept so the prompt lists tools
/// deterministically.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name in place
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&slot| self.tools[slot].clone())
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `name: description` lines, one per tool
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Names of tools whose input must be JSON
    pub fn json_tools(&self) -> HashSet<String> {
        self.tools
            .iter()
            .filter(|t| t.expects_json())
            .map(|t| t.name().to_string())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the advisor's tool set
pub fn create_default_registry(
    config: &AdvisorConfig,
    memory: Arc<dyn MemoryStore>,
    fabric: Arc<dyn FabricClient>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(CannedResponseTool::new(
        ASK_INITIAL_QUESTION,
        "Starts the conversation to understand user requirements or set context.",
        "What are you looking for in terms of financial analysis or investment advice?",
    )));
    registry.register(Arc::new(GetStockPositioningTool::new(
        fabric,
        memory.clone(),
    )));
    registry.register(Arc::new(AskFinancialGoalTool));
    registry.register(Arc::new(CannedResponseTool::new(
        CALCULATE_RISK,
        "Analyzes the user's stock portfolio to calculate associated risks.",
        "Based on your portfolio, we calculate a risk score of 7/10 with moderate diversification metrics.",
    )));
    registry.register(Arc::new(CannedResponseTool::new(
        SUGGEST_RISK_PLAN,
        "Provides a risk mitigation plan based on the calculated risks in the user's portfolio.",
        "To mitigate risks, we suggest diversifying further into bonds and international equities.",
    )));
    registry.register(Arc::new(CalculateInvestmentPlanTool::new(
        memory,
        config.default_client_id.clone(),
    )));
    registry.register(Arc::new(CannedResponseTool::new(
        SUGGEST_INVESTMENT_PLAN,
        "Recommends an investment plan aligned with the user's financial goals.",
        "Here’s a suggested investment plan tailored to your goal. Let us know if it meets your expectations.",
    )));
    registry.register(Arc::new(HandleFeedbackTool));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::StaticFabric;
    use crate::memory::InMemoryMemoryStore;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        create_default_registry(
            &AdvisorConfig::default(),
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(StaticFabric::new("AAPL: 100")),
        )
    }

    #[test]
    fn test_default_registry_order() {
        let registry = registry();
        assert_eq!(
            registry.list(),
            vec![
                ASK_INITIAL_QUESTION,
                GET_STOCK_POSITIONING,
                ASK_FINANCIAL_GOAL,
                CALCULATE_RISK,
                SUGGEST_RISK_PLAN,
                CALCULATE_INVESTMENT_PLAN,
                SUGGEST_INVESTMENT_PLAN,
                HANDLE_FEEDBACK,
            ]
        );
    }

    #[test]
    fn test_json_tools_flagged() {
        let json_tools = registry().json_tools();
        assert_eq!(json_tools.len(), 2);
        assert!(json_tools.contains(GET_STOCK_POSITIONING));
        assert!(json_tools.contains(CALCULATE_INVESTMENT_PLAN));
    }

    #[test]
    fn test_describe_lists_every_tool() {
        let registry = registry();
        let description = registry.describe();
        assert_eq!(description.lines().count(), registry.len());
        assert!(description.contains(
            "Handle Feedback: Processes user feedback and provides alternative plans or suggestions."
        ));
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = registry();
        registry.register(Arc::new(CannedResponseTool::new(
            CALCULATE_RISK,
            "replacement",
            "always low",
        )));
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.list()[3], CALCULATE_RISK);
        assert_eq!(registry.get(CALCULATE_RISK).unwrap().description(), "replacement");
    }

    #[test]
    fn test_outcome_rendering() {
        let ok = ToolOutcome::success(json!({"plan": {"goal": "house"}}));
        assert_eq!(ok.to_value(), json!({"status": "success", "plan": {"goal": "house"}}));

        let err = ToolOutcome::failure("nope").with_field("portfolio_data", Value::Null);
        assert_eq!(
            err.to_value(),
            json!({"status": "error", "message": "nope", "portfolio_data": null})
        );
        assert!(!err.is_success());

        let wrapped = ToolOutcome::success(json!(42));
        assert_eq!(wrapped.to_value()["result"], 42);
    }
}
