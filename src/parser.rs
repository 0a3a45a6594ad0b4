//! Model output grammar
//!
//! One reasoning step of model text is either a tool call:
//!
//! ```text
//! Thought: I need the portfolio first
//! Action: Get Stock Positioning
//! Action Input: client-42
//! ```
//!
//! or anything else, which is taken verbatim as the final answer.

use crate::error::AdvisorError;
use crate::models::{AgentAction, AgentFinish};
use crate::tools::ToolRegistry;
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::warn;

lazy_static! {
    /// `Action: <name>` up to the end of its line
    static ref ACTION_RE: Regex =
        Regex::new(r"Action: (.*?)(?:\n|$)").expect("action pattern is valid");
    /// `Action Input: <input>` up to the end of its line
    static ref ACTION_INPUT_RE: Regex =
        Regex::new(r"Action Input: (.*?)(?:\n|$)").expect("action input pattern is valid");
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedStep {
    Action(AgentAction),
    Finish(AgentFinish),
}

/// Parses model text into an action or a final answer. Never fails: internal
/// errors come back as a `Finish` describing the problem.
#[derive(Debug, Clone, Default)]
pub struct OutputParser {
    json_tools: HashSet<String>,
}

impl OutputParser {
    /// `json_tools` are the tools whose input is repaired into JSON
    pub fn new(json_tools: HashSet<String>) -> Self {
        Self { json_tools }
    }

    pub fn for_registry(registry: &ToolRegistry) -> Self {
        Self::new(registry.json_tools())
    }

    pub fn parse(&self, text: &str) -> ParsedStep {
        match self.try_parse(text) {
            Ok(step) => step,
            Err(e) => {
                warn!(error = %e, "Failed to parse model output");
                ParsedStep::Finish(AgentFinish {
                    output: format!("Error parsing output: {}", e),
                    raw_model_text: text.to_string(),
                })
            }
        }
    }

    fn try_parse(&self, text: &str) -> Result<ParsedStep> {
        let Some((tool_name, input)) = find_action(text) else {
            return Ok(ParsedStep::Finish(AgentFinish {
                output: text.to_string(),
                raw_model_text: text.to_string(),
            }));
        };

        if tool_name.is_empty() {
            return Err(AdvisorError::ParseError(
                "Action line names no tool".to_string(),
            ));
        }

        let tool_input = if self.json_tools.contains(&tool_name) {
            repair_json_input(&input)?
        } else {
            input
        };

        Ok(ParsedStep::Action(AgentAction {
            tool_name,
            tool_input,
            raw_model_text: text.to_string(),
        }))
    }
}

/// First `Action:` line and the first `Action Input:` line after it
fn find_action(text: &str) -> Option<(String, String)> {
    let action = ACTION_RE.captures(text)?;
    let action_end = action.get(0)?.end();
    let name = action.get(1)?.as_str().trim().to_string();

    let input = ACTION_INPUT_RE.captures(&text[action_end..])?;
    let input = input.get(1)?.as_str().trim().to_string();

    Some((name, input))
}

/// Keep valid JSON as-is; wrap anything else as `{"user_input": ...}`
fn repair_json_input(input: &str) -> Result<String> {
    if serde_json::from_str::<Value>(input).is_ok() {
        return Ok(input.to_string());
    }
    Ok(serde_json::to_string(&json!({ "user_input": input }))?)
}
