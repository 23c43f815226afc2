//! Interactive diagnostics assistant: one query per line against the
//! configured cluster.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kube_triage::config::Config;
use kube_triage::orchestrator::init_orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting kube-triage");

    let orchestrator = init_orchestrator(&config)?;
    let conversation_id = Uuid::new_v4();

    println!("kube-triage: Kubernetes diagnostics assistant");
    println!("Ask about cluster or service health. Type 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }

        match orchestrator.process_query(query, Some(conversation_id)).await {
            Ok(outcome) => {
                println!("\n{}", outcome.response);
                if outcome.degraded {
                    println!("\n(some diagnostic steps did not complete; results may be partial)");
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    info!("exiting");
    Ok(())
}
