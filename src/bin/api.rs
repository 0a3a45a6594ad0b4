use financial_advisor_agent::{api::start_server, AdvisorConfig, AdvisorService};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AdvisorConfig::from_env()?;
    let port = config.port;

    info!("🚀 Financial Advisor Agent - API Server");
    info!("📍 Port: {}", port);
    info!("🤖 Model: {}", config.gemini_model);

    let advisor = Arc::new(AdvisorService::from_config(config)?);

    info!("✅ Advisor initialized");

    start_server(advisor, port).await?;

    Ok(())
}
