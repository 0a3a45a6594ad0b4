//! Prompt construction for the advisor agent
//!
//! The system prompt is rebuilt for every agent from the live tool registry.
//! The transcript appends chat history, the question and the scratchpad of
//! executed steps, ending in `Thought:` for the model to continue.

use crate::models::AgentStep;
use crate::tools::ToolRegistry;

/// Stop sequence so the model does not invent its own observations
pub const OBSERVATION_STOP: &str = "\nObservation:";

const WORKFLOW_INSTRUCTIONS: &str = r#"You are an intelligent financial advisor assistant. You must maintain context and pass data between tools using JSON formatting.

CRITICAL WORKFLOW:
1. ALWAYS start with Get Stock Positioning
2. Parse the JSON response from Get Stock Positioning
3. Combine the portfolio data with user goals when calling subsequent tools

Data Handling Rules:
- All tool inputs and outputs are JSON strings
- You must parse tool responses before using them
- When calling a new tool, include previous tool data in the request

Example Correct Sequence:
User: "new_user,I want to buy a house"
Thought: Must get stock positioning first
Action: Get Stock Positioning
Action Input: new_user
Observation: {"status": "success", "portfolio_data": {"stocks": "AAPL: 100, GOOGL: 50"}}
Thought: Now I have the portfolio data, I'll calculate an investment plan
Action: Calculate Investment Plan
Action Input: {"client_id": "new_user", "portfolio_data": {"stocks": "AAPL: 100, GOOGL: 50"}, "goal_data": {"type": "house", "timeline": "5 years", "target_amount": "500000"}}

Key Points:
- ALL tool interactions must use JSON format
- ALWAYS include previous tool data in subsequent calls
- PARSE and VERIFY tool responses before proceeding

Remember: Invalid or missing data handling:
- If Get Stock Positioning returns error status, ask for more information
- If data is incomplete, gather missing information before calculations
- Always check status field in tool responses"#;

/// Build the system prompt: workflow rules, response format and one
/// `name: description` line per registered tool.
pub fn build_system_prompt(registry: &ToolRegistry) -> String {
    format!(
        "{}\n\nYou have access to the following tools:\n\n{}\n\n{}",
        WORKFLOW_INSTRUCTIONS,
        registry.describe(),
        format_instructions(registry)
    )
}

fn format_instructions(registry: &ToolRegistry) -> String {
    format!(
        r#"Each user message starts with the client id followed by a comma.

To use a tool, reply with exactly:
Thought: what you are doing and why
Action: the tool to use, one of [{}]
Action Input: the input to the tool on a single line

You will then receive:
Observation: the tool result

When you can answer the user, reply with the answer only and no Action lines."#,
        registry.list().join(", ")
    )
}

/// Full transcript for one reasoning step
pub fn render_transcript(
    system_prompt: &str,
    chat_history: &str,
    question: &str,
    steps: &[AgentStep],
) -> String {
    let mut transcript = String::with_capacity(system_prompt.len() + question.len() + 256);

    transcript.push_str(system_prompt);
    transcript.push_str("\n\n");

    if !chat_history.trim().is_empty() {
        transcript.push_str("Previous conversation:\n");
        transcript.push_str(chat_history);
        transcript.push_str("\n\n");
    }

    transcript.push_str("Question: ");
    transcript.push_str(question);
    transcript.push('\n');

    for step in steps {
        let text = step.action.raw_model_text.trim_end();
        if !text.trim_start().starts_with("Thought:") {
            transcript.push_str("Thought:");
            if !text.starts_with(char::is_whitespace) {
                transcript.push(' ');
            }
        }
        transcript.push_str(text);
        transcript.push_str("\nObservation: ");
        transcript.push_str(&step.observation);
        transcript.push('\n');
    }

    transcript.push_str("Thought:");
    transcript
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdvisorConfig;
    use crate::fabric::StaticFabric;
    use crate::memory::InMemoryMemoryStore;
    use crate::models::AgentAction;
    use crate::tools::create_default_registry;
    use std::sync::Arc;

    fn registry() -> ToolRegistry {
        create_default_registry(
            &AdvisorConfig::default(),
            Arc::new(InMemoryMemoryStore::new()),
            Arc::new(StaticFabric::new("AAPL: 1")),
        )
    }

    #[test]
    fn test_system_prompt_embeds_tools() {
        let registry = registry();
        let prompt = build_system_prompt(&registry);

        assert!(prompt.contains("ALWAYS start with Get Stock Positioning"));
        for name in registry.list() {
            assert!(prompt.contains(&format!("{}: ", name)), "{}", name);
        }
        assert!(prompt.contains("one of [Ask Initial Question, Get Stock Positioning,"));
    }

    #[test]
    fn test_transcript_without_history() {
        let transcript = render_transcript("SYSTEM", "", "c1,hello", &[]);
        assert_eq!(transcript, "SYSTEM\n\nQuestion: c1,hello\nThought:");
    }

    #[test]
    fn test_transcript_with_history_and_steps() {
        let step = AgentStep {
            action: AgentAction {
                tool_name: "Calculate Risk".to_string(),
                tool_input: "{}".to_string(),
                raw_model_text: " I should score the risk\nAction: Calculate Risk\nAction Input: {}\n".to_string(),
            },
            observation: r#"{"status":"success"}"#.to_string(),
            execution_time_ms: 1,
        };

        let transcript = render_transcript("SYSTEM", "Human: hi\nAI: hello", "c1,risk?", &[step]);

        assert!(transcript.contains("Previous conversation:\nHuman: hi\nAI: hello\n\n"));
        assert!(transcript.contains("Question: c1,risk?\nThought: I should score the risk\nAction: Calculate Risk"));
        assert!(transcript.contains("Action Input: {}\nObservation: {\"status\":\"success\"}\nThought:"));
        assert!(transcript.ends_with("Thought:"));
    }

    #[test]
    fn test_step_thought_label_not_doubled() {
        let step = |raw: &str| AgentStep {
            action: AgentAction {
                tool_name: "Calculate Risk".to_string(),
                tool_input: "x".to_string(),
                raw_model_text: raw.to_string(),
            },
            observation: "{}".to_string(),
            execution_time_ms: 0,
        };

        let labelled = render_transcript(
            "S",
            "",
            "q",
            &[step("Thought: check risk\nAction: Calculate Risk\nAction Input: x")],
        );
        assert!(labelled.contains("q\nThought: check risk\nAction:"));
        assert!(!labelled.contains("Thought: Thought:"));

        let bare = render_transcript("S", "", "q", &[step("Action: Calculate Risk\nAction Input: x")]);
        assert!(bare.contains("q\nThought: Action: Calculate Risk"));
    }
}
