//! Financial Advisor Agent
//!
//! A conversational agent that:
//! - Routes each turn to risk analysis or investment planning
//! - Drives a reason/act loop over a fixed set of advisory tools
//! - Fetches holdings from a fabric data service
//! - Remembers conversation turns and the latest portfolio per user
//!
//! TURN LOOP:
//! INPUT → CLASSIFY → THOUGHT → ACTION → OBSERVATION → ... → ANSWER → PERSIST

pub mod advisor;
pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fabric;
pub mod llm;
pub mod memory;
pub mod models;
pub mod parser;
pub mod prompt;
pub mod tools;

pub use error::{AdvisorError, Result};

// Re-export common types
pub use advisor::{AdvisorService, ConversationReply};
pub use agent::AdvisorAgent;
pub use classifier::{detect_intent, IntentClassifier};
pub use config::AdvisorConfig;
pub use models::*;
