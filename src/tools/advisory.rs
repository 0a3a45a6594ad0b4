//! Conversational advisory tools
//!
//! Stateless responders. They do not look at portfolio data.

use super::{Tool, ToolOutcome, ASK_FINANCIAL_GOAL, HANDLE_FEEDBACK};
use serde_json::{json, Value};

/// Tool that answers every input with a fixed message
pub struct CannedResponseTool {
    tool_name: &'static str,
    tool_description: &'static str,
    response: &'static str,
}

impl CannedResponseTool {
    pub fn new(
        tool_name: &'static str,
        tool_description: &'static str,
        response: &'static str,
    ) -> Self {
        Self {
            tool_name,
            tool_description,
            response,
        }
    }
}

#[async_trait::async_trait]
impl Tool for CannedResponseTool {
    fn name(&self) -> &'static str {
        self.tool_name
    }

    fn description(&self) -> &'static str {
        self.tool_description
    }

    async fn invoke(&self, _input: &str) -> ToolOutcome {
        ToolOutcome::message(self.response)
    }
}

pub struct AskFinancialGoalTool;

#[async_trait::async_trait]
impl Tool for AskFinancialGoalTool {
    fn name(&self) -> &'static str {
        ASK_FINANCIAL_GOAL
    }

    fn description(&self) -> &'static str {
        "Queries the user about their financial goals, such as savings or retirement plans."
    }

    /// Echoes any JSON it was given as `previous_data` so earlier tool
    /// output survives the round trip through the model.
    async fn invoke(&self, input: &str) -> ToolOutcome {
        let previous_data = if input.trim().is_empty() {
            Some(json!({}))
        } else {
            serde_json::from_str::<Value>(input).ok()
        };

        match previous_data {
            Some(previous_data) => ToolOutcome::message("What are your specific financial goals?")
                .with_field("previous_data", previous_data),
            None => ToolOutcome::message(
                "What are your specific financial goals? Please include target amount and timeline.",
            ),
        }
    }
}

pub const ALTERNATIVE_PLAN_RESPONSE: &str =
    "Here’s an alternative plan: 40% stocks, 40% bonds, and 20% savings for a more conservative approach.";

pub const FEEDBACK_ACK_RESPONSE: &str =
    "Great! Let us know if you have any further questions or concerns.";

pub struct HandleFeedbackTool;

#[async_trait::async_trait]
impl Tool for HandleFeedbackTool {
    fn name(&self) -> &'static str {
        HANDLE_FEEDBACK
    }

    fn description(&self) -> &'static str {
        "Processes user feedback and provides alternative plans or suggestions."
    }

    async fn invoke(&self, input: &str) -> ToolOutcome {
        if input.to_lowercase().contains("alternative") {
            ToolOutcome::message(ALTERNATIVE_PLAN_RESPONSE)
        } else {
            ToolOutcome::message(FEEDBACK_ACK_RESPONSE)
        }
    }
}
