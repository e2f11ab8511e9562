use anyhow::{Context, Result};
use clap::Args;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print raw JSON instead of a formatted summary.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/health", config.port);
    let body: serde_json::Value = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach toolhost server at {url}"))?
        .json()
        .await
        .context("failed to parse server health response")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("status: {}", body["status"].as_str().unwrap_or("unknown"));
    if let Some(workers) = body["workers"].as_array() {
        for worker in workers {
            println!(
                "  {} -> {}",
                worker["namespace"].as_str().unwrap_or("?"),
                worker["status"].as_str().unwrap_or("?")
            );
        }
    }
    if let Some(metrics) = body.get("metrics") {
        println!(
            "metrics: {} restarts, {} active calls, {} sandbox runs ({} timed out), {} mcp calls",
            metrics["worker_restarts"].as_u64().unwrap_or(0),
            metrics["active_calls"].as_u64().unwrap_or(0),
            metrics["sandbox_runs"].as_u64().unwrap_or(0),
            metrics["sandbox_timeouts"].as_u64().unwrap_or(0),
            metrics["mcp_calls"].as_u64().unwrap_or(0),
        );
    }
    Ok(())
}
