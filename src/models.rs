//! Core data models for the advisor agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

//
// ================= Intent =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    RiskAnalysis,
    InvestmentPlanning,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::RiskAnalysis => "risk_analysis",
            Intent::InvestmentPlanning => "investment_planning",
            Intent::Unknown => "unknown",
        }
    }

    /// Label reported to HTTP clients. Investment planning is reported as
    /// `investment_plan`, which existing front ends match on.
    pub fn route_label(&self) -> &'static str {
        match self {
            Intent::RiskAnalysis => "risk_analysis",
            Intent::InvestmentPlanning => "investment_plan",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Memory =================
//

/// One user turn. Appended, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub turn_id: Uuid,
    pub user_id: String,
    pub input_text: String,
    pub output_text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user_id: &str, input_text: &str, output_text: &str) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            input_text: input_text.to_string(),
            output_text: output_text.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Latest known holdings for a user. Replaced wholesale on every fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSnapshot {
    pub user_id: String,
    /// Either structured JSON or the raw fabric answer as a string
    pub stocks: serde_json::Value,
    pub last_updated: DateTime<Utc>,
    /// SHA-256 of the serialized `stocks` payload
    pub digest: String,
}

impl PortfolioSnapshot {
    pub fn new(user_id: &str, stocks: serde_json::Value, last_updated: DateTime<Utc>) -> Self {
        let digest = stocks_digest(&stocks);
        Self {
            user_id: user_id.to_string(),
            stocks,
            last_updated,
            digest,
        }
    }

    /// Extract a snapshot from a tool payload of the form
    /// `{"portfolio_data": {"stocks": ..., "last_updated": ...}}`.
    pub fn from_payload(user_id: &str, payload: &serde_json::Value) -> Option<Self> {
        let portfolio = payload.get("portfolio_data")?.as_object()?;
        let stocks = portfolio.get("stocks")?.clone();
        let last_updated = portfolio
            .get("last_updated")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Some(Self::new(user_id, stocks, last_updated))
    }
}

fn stocks_digest(stocks: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stocks.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Everything the memory store knows about a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryContext {
    pub turns: Vec<ConversationTurn>,
    pub portfolio: Option<PortfolioSnapshot>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.portfolio.is_none()
    }

    /// Render turns as a `Human:` / `AI:` chat buffer, oldest first.
    /// `window` limits the rendering to the most recent turns.
    pub fn chat_history(&self, window: Option<usize>) -> String {
        let skip = match window {
            Some(n) => self.turns.len().saturating_sub(n),
            None => 0,
        };

        self.turns
            .iter()
            .skip(skip)
            .map(|turn| format!("Human: {}\nAI: {}", turn.input_text, turn.output_text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

//
// ================= Agent steps =================
//

/// A tool invocation decided by the model for one reasoning step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentAction {
    pub tool_name: String,
    pub tool_input: String,
    pub raw_model_text: String,
}

/// A terminal answer for the turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentFinish {
    pub output: String,
    pub raw_model_text: String,
}

/// An executed action paired with the observation it produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub action: AgentAction,
    pub observation: String,
    pub execution_time_ms: u64,
}

/// Final result of one agent turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub input: String,
    pub output: String,
    pub intermediate_steps: Vec<AgentStep>,
    /// True when the step limit ended the turn
    pub truncated: bool,
}
