//! Runtime configuration
//!
//! Loaded once at startup and handed to the agent, the tool registry and the
//! collaborators by value. Nothing reads the environment while serving a turn.

use crate::error::AdvisorError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Sampling temperature passed on every model call
    pub temperature: f32,
    /// Upper bound on reason/act iterations per turn
    pub max_steps: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    /// Extra attempts after a failed model call
    pub model_retries: u32,
    /// Number of most recent turns rendered into the prompt
    pub history_window: usize,
    pub fabric_base_url: Option<String>,
    pub database_url: Option<String>,
    /// Client id used when a planning request carries none
    pub default_client_id: String,
    pub port: u16,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: "gemini-2.0-flash".to_string(),
            temperature: 0.1,
            max_steps: 15,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            model_retries: 2,
            history_window: 20,
            fabric_base_url: None,
            database_url: None,
            default_client_id: "default_user".to_string(),
            port: 7001,
        }
    }
}

impl AdvisorConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset. Call `dotenv::dotenv()` first if a `.env`
    /// file should be honoured.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: non_empty_var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            temperature: parse_var("ADVISOR_TEMPERATURE")?.unwrap_or(defaults.temperature),
            max_steps: parse_var("ADVISOR_MAX_STEPS")?.unwrap_or(defaults.max_steps),
            model_timeout: parse_var("ADVISOR_MODEL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.model_timeout),
            tool_timeout: parse_var("ADVISOR_TOOL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.tool_timeout),
            model_retries: parse_var("ADVISOR_MODEL_RETRIES")?.unwrap_or(defaults.model_retries),
            history_window: parse_var("ADVISOR_HISTORY_WINDOW")?
                .unwrap_or(defaults.history_window),
            fabric_base_url: non_empty_var("FABRIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            database_url: non_empty_var("POSTGRES_URL").or_else(|| non_empty_var("DATABASE_URL")),
            default_client_id: non_empty_var("ADVISOR_DEFAULT_CLIENT_ID")
                .unwrap_or(defaults.default_client_id),
            port: match parse_var("PORT")? {
                Some(port) => port,
                None => parse_var("API_PORT")?.unwrap_or(defaults.port),
            },
        })
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>> {
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AdvisorError::ConfigError(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}
