//! REST API Server for the financial advisor
//!
//! Exposes one conversation endpoint plus a health check.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::advisor::{AdvisorService, ConversationReply};
use crate::error::AdvisorError;
use crate::models::AgentStep;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConversationRequest {
    #[serde(default)]
    pub input: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StepView {
    pub tool: String,
    pub tool_input: String,
    pub observation: String,
}

impl From<&AgentStep> for StepView {
    fn from(step: &AgentStep) -> Self {
        Self {
            tool: step.action.tool_name.clone(),
            tool_input: step.action.tool_input.clone(),
            observation: step.observation.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentResponse {
    pub input: String,
    pub output: String,
    pub intermediate_steps: Vec<StepView>,
    pub truncated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub intent: String,
    pub response: AgentResponse,
}

impl From<ConversationReply> for ConversationResponse {
    fn from(reply: ConversationReply) -> Self {
        let outcome = reply.outcome;
        Self {
            intent: reply.intent.route_label().to_string(),
            response: AgentResponse {
                intermediate_steps: outcome.intermediate_steps.iter().map(StepView::from).collect(),
                input: outcome.input,
                output: outcome.output,
                truncated: outcome.truncated,
            },
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub advisor: Arc<AdvisorService>,
}

fn error_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "error": message.into() }))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Conversation Endpoint
/// =============================

async fn conversation(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<ConversationRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected conversation request body: {}", rejection.body_text());
            return (StatusCode::BAD_REQUEST, error_body(rejection.body_text()));
        }
    };

    let Some(user_id) = req.user_id.filter(|id| !id.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, error_body("User ID is required"));
    };

    info!(user_id = %user_id, "Received conversation request");

    match state.advisor.converse(&user_id, &req.input).await {
        Ok(reply) => {
            let body = ConversationResponse::from(reply);
            match serde_json::to_value(&body) {
                Ok(value) => (StatusCode::OK, Json(value)),
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body(e.to_string()),
                ),
            }
        }
        Err(AdvisorError::InvalidRequest(message)) => {
            (StatusCode::BAD_REQUEST, error_body(message))
        }
        Err(e) => {
            error!(user_id = %user_id, "Conversation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(advisor: Arc<AdvisorService>) -> Router {
    let state = ApiState { advisor };

    Router::new()
        .route("/health", get(health))
        .route("/conversation", post(conversation))
        .route("/conversation/", post(conversation))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    advisor: Arc<AdvisorService>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(advisor);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
