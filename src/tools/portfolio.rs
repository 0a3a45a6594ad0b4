//! Portfolio tools
//!
//! Stock positioning fetches holdings from the fabric service and stores
//! them as the user's snapshot. Investment planning reads that snapshot back;
//! portfolio data supplied by the model is ignored.

use super::{Tool, ToolOutcome, CALCULATE_INVESTMENT_PLAN, GET_STOCK_POSITIONING};
use crate::fabric::FabricClient;
use crate::memory::MemoryStore;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Literal the model sends when it has no client id
const MISSING_CLIENT_SENTINEL: &str = "None";

const RECOMMENDED_INVESTMENT: &str = "$10,000/year";

/// Pull a client id out of the action input. Accepts a bare id, a JSON
/// string, or a JSON object carrying `client_id`, `user_id` or `user_input`.
fn extract_client_id(input: &str) -> String {
    let trimmed = input.trim();

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["client_id", "user_id", "user_input"]
            .iter()
            .find_map(|key| match map.get(*key) {
                Some(Value::String(s)) => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default(),
        Ok(Value::String(s)) => s.trim().to_string(),
        Ok(Value::Number(n)) => n.to_string(),
        _ => trimmed.trim_matches('"').to_string(),
    }
}

pub struct GetStockPositioningTool {
    fabric: Arc<dyn FabricClient>,
    memory: Arc<dyn MemoryStore>,
}

impl GetStockPositioningTool {
    pub fn new(fabric: Arc<dyn FabricClient>, memory: Arc<dyn MemoryStore>) -> Self {
        Self { fabric, memory }
    }
}

#[async_trait::async_trait]
impl Tool for GetStockPositioningTool {
    fn name(&self) -> &'static str {
        GET_STOCK_POSITIONING
    }

    fn description(&self) -> &'static str {
        "Retrieves the user's stock portfolio data, based on the user id. If not available, asks the user to share their portfolio details."
    }

    fn expects_json(&self) -> bool {
        true
    }

    async fn invoke(&self, input: &str) -> ToolOutcome {
        let client_id = extract_client_id(input);

        if client_id.is_empty() || client_id == MISSING_CLIENT_SENTINEL {
            debug!("Stock positioning requested without a client id");
            return ToolOutcome::failure("Please provide your client ID.")
                .with_field("portfolio_data", Value::Null);
        }

        let prompt = format!(
            "Fetch all details for the client id {} including their portfolios, assets, risk metrics, and recommended asset allocations.",
            client_id
        );

        let client_data = match self.fabric.query(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "Fabric query failed");
                return ToolOutcome::failure(format!("Error: {}", e))
                    .with_field("portfolio_data", Value::Null);
            }
        };

        let payload = json!({
            "status": "success",
            "portfolio_data": {
                "stocks": client_data,
                "last_updated": Utc::now().to_rfc3339(),
            }
        });

        if let Err(e) = self
            .memory
            .save(
                &client_id,
                &format!("Fetching portfolio data for client {}", client_id),
                "Portfolio data retrieved successfully",
                Some(&payload),
            )
            .await
        {
            warn!(client_id = %client_id, error = %e, "Failed to persist portfolio snapshot");
            return ToolOutcome::failure(format!("Error: {}", e))
                .with_field("portfolio_data", Value::Null);
        }

        info!(client_id = %client_id, "Portfolio snapshot stored");

        ToolOutcome::success(payload)
    }
}

pub struct CalculateInvestmentPlanTool {
    memory: Arc<dyn MemoryStore>,
    default_client_id: String,
}

impl CalculateInvestmentPlanTool {
    pub fn new(memory: Arc<dyn MemoryStore>, default_client_id: String) -> Self {
        Self {
            memory,
            default_client_id,
        }
    }

    /// Split the action input into `(client_id, goal_type)`.
    ///
    /// A JSON object supplies `client_id` and `goal_data.type`; a repaired
    /// `{"user_input": ...}` object or any non-object input is taken as the
    /// goal type itself under the default client id.
    fn read_request(&self, input: &str) -> (String, Value) {
        match serde_json::from_str::<Value>(input) {
            Ok(Value::Object(map)) => {
                let client_id = map
                    .get("client_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.trim().is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| self.default_client_id.clone());

                let goal = match map.get("goal_data") {
                    Some(Value::Object(goal_data)) => goal_data.get("type").cloned(),
                    Some(Value::String(goal)) => Some(Value::String(goal.clone())),
                    _ => map.get("user_input").cloned(),
                };

                (client_id, goal.unwrap_or_else(|| json!("No goal specified")))
            }
            Ok(Value::String(goal)) => (self.default_client_id.clone(), Value::String(goal)),
            _ => (self.default_client_id.clone(), Value::String(input.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl Tool for CalculateInvestmentPlanTool {
    fn name(&self) -> &'static str {
        CALCULATE_INVESTMENT_PLAN
    }

    fn description(&self) -> &'static str {
        "Creates a tailored investment plan based on user input and extracted portfolio data from Get Stock Positioning tool"
    }

    fn expects_json(&self) -> bool {
        true
    }

    async fn invoke(&self, input: &str) -> ToolOutcome {
        let (client_id, goal) = self.read_request(input);

        let snapshot = match self.memory.get_portfolio(&client_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "Failed to load portfolio snapshot");
                return ToolOutcome::failure(format!("Error calculating plan: {}", e))
                    .with_field("plan", Value::Null);
            }
        };

        let stocks = snapshot
            .as_ref()
            .map(|s| s.stocks.clone())
            .unwrap_or_else(|| json!("No stock data"));

        debug!(
            client_id = %client_id,
            has_snapshot = snapshot.is_some(),
            goal = %goal,
            "Calculating investment plan from stored portfolio"
        );

        ToolOutcome::success(json!({
            "client_id": client_id,
            "plan": {
                "stocks": stocks,
                "goal": goal,
                "recommended_investment": RECOMMENDED_INVESTMENT,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::StaticFabric;
    use crate::memory::InMemoryMemoryStore;

    fn stock_tool(fabric: Arc<StaticFabric>, memory: Arc<InMemoryMemoryStore>) -> GetStockPositioningTool {
        GetStockPositioningTool::new(fabric, memory)
    }

    #[test]
    fn test_extract_client_id() {
        assert_eq!(extract_client_id("client-42"), "client-42");
        assert_eq!(extract_client_id(" \"client-42\" "), "client-42");
        assert_eq!(extract_client_id(r#"{"client_id": "c9"}"#), "c9");
        assert_eq!(extract_client_id(r#"{"user_input": "new_user"}"#), "new_user");
        assert_eq!(extract_client_id("1234"), "1234");
        assert_eq!(extract_client_id(r#"{"other": 1}"#), "");
    }

    #[tokio::test]
    async fn test_none_sentinel_skips_fetch() {
        let fabric = Arc::new(StaticFabric::new("AAPL: 100"));
        let memory = Arc::new(InMemoryMemoryStore::new());
        let tool = stock_tool(fabric.clone(), memory.clone());

        let outcome = tool.invoke("None").await;
        let value = outcome.to_value();

        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "Please provide your client ID.");
        assert!(value["portfolio_data"].is_null());
        assert_eq!(fabric.call_count(), 0);
        assert!(memory.load("None").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_stores_snapshot() {
        let fabric = Arc::new(StaticFabric::new("AAPL: 100, GOOGL: 50"));
        let memory = Arc::new(InMemoryMemoryStore::new());
        let tool = stock_tool(fabric.clone(), memory.clone());

        let value = tool.invoke("client-7").await.to_value();
        assert_eq!(value["status"], "success");
        assert_eq!(value["portfolio_data"]["stocks"], "AAPL: 100, GOOGL: 50");
        assert!(value["portfolio_data"]["last_updated"].is_string());
        assert_eq!(fabric.call_count(), 1);

        let context = memory.load("client-7").await.unwrap();
        assert_eq!(context.turns.len(), 1);
        assert_eq!(context.turns[0].input_text, "Fetching portfolio data for client client-7");
        assert_eq!(
            context.portfolio.unwrap().stocks,
            json!("AAPL: 100, GOOGL: 50")
        );
    }

    #[tokio::test]
    async fn test_fabric_failure_is_error_payload() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let tool = GetStockPositioningTool::new(Arc::new(crate::fabric::UnconfiguredFabric), memory);

        let value = tool.invoke("client-7").await.to_value();
        assert_eq!(value["status"], "error");
        assert!(value["message"].as_str().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_plan_uses_stored_snapshot_over_model_data() {
        let fabric = Arc::new(StaticFabric::new("AAPL: 100, GOOGL: 50"));
        let memory = Arc::new(InMemoryMemoryStore::new());
        stock_tool(fabric, memory.clone()).invoke("client-7").await;

        let planner = CalculateInvestmentPlanTool::new(memory, "default_user".to_string());
        let input = json!({
            "client_id": "client-7",
            "portfolio_data": {"stocks": "TSLA: 1"},
            "goal_data": {"type": "house", "timeline": "5 years"}
        })
        .to_string();

        let value = planner.invoke(&input).await.to_value();
        assert_eq!(value["status"], "success");
        assert_eq!(value["plan"]["stocks"], "AAPL: 100, GOOGL: 50");
        assert_eq!(value["plan"]["goal"], "house");
        assert_eq!(value["plan"]["recommended_investment"], "$10,000/year");
    }

    #[tokio::test]
    async fn test_plan_with_empty_model_portfolio() {
        let fabric = Arc::new(StaticFabric::new("MSFT: 10"));
        let memory = Arc::new(InMemoryMemoryStore::new());
        stock_tool(fabric, memory.clone()).invoke("c1").await;

        let planner = CalculateInvestmentPlanTool::new(memory, "default_user".to_string());
        let input = r#"{"client_id": "c1", "portfolio_data": {}, "goal_data": {"type": "retirement"}}"#;

        let value = planner.invoke(input).await.to_value();
        assert_eq!(value["plan"]["stocks"], "MSFT: 10");
    }

    #[tokio::test]
    async fn test_plan_from_plain_text_uses_default_user() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        memory
            .save(
                "default_user",
                "seed",
                "seed",
                Some(&json!({"portfolio_data": {"stocks": "VTI: 3"}})),
            )
            .await
            .unwrap();

        let planner = CalculateInvestmentPlanTool::new(memory, "default_user".to_string());

        let value = planner.invoke("buy a boat").await.to_value();
        assert_eq!(value["client_id"], "default_user");
        assert_eq!(value["plan"]["goal"], "buy a boat");
        assert_eq!(value["plan"]["stocks"], "VTI: 3");

        let repaired = planner.invoke(r#"{"user_input": "college fund"}"#).await.to_value();
        assert_eq!(repaired["plan"]["goal"], "college fund");
    }

    #[tokio::test]
    async fn test_plan_without_snapshot() {
        let planner = CalculateInvestmentPlanTool::new(
            Arc::new(InMemoryMemoryStore::new()),
            "default_user".to_string(),
        );

        let value = planner.invoke(r#"{"client_id": "ghost"}"#).await.to_value();
        assert_eq!(value["status"], "success");
        assert_eq!(value["plan"]["stocks"], "No stock data");
        assert_eq!(value["plan"]["goal"], "No goal specified");
    }
}
