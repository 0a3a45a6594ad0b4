use financial_advisor_agent::{AdvisorConfig, AdvisorService};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Interactive session against the advisor: `advisor [user_id]`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AdvisorConfig::from_env()?;
    let user_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.default_client_id.clone());

    let advisor = AdvisorService::from_config(config)?;
    info!(user_id = %user_id, "Advisor session started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("Financial advisor ready for {}. Type 'exit' to quit.\n", user_id).as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        match advisor.converse(&user_id, input).await {
            Ok(reply) => {
                for step in &reply.outcome.intermediate_steps {
                    stdout
                        .write_all(
                            format!("  [{}] {}\n", step.action.tool_name, step.observation)
                                .as_bytes(),
                        )
                        .await?;
                }
                stdout
                    .write_all(
                        format!("({}) {}\n", reply.intent.route_label(), reply.outcome.output)
                            .as_bytes(),
                    )
                    .await?;
            }
            Err(e) => {
                eprintln!("Advisor failed: {}", e);
            }
        }
    }

    Ok(())
}
