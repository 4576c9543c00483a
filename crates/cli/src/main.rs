mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use slotwheel::{load_dotenv, Runs, TimeWheel};

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let config = args
        .resolve_config()
        .context("failed to load wheel configuration")?;
    config.log_summary();

    let wheel: TimeWheel<String, String> =
        TimeWheel::from_config(&config).context("failed to create time wheel")?;
    wheel.start().context("failed to start time wheel")?;

    arm_demo_tasks(&wheel, config.interval(), args.tasks).await?;

    if args.run_for_secs == 0 {
        info!("running until Ctrl-C");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    } else {
        info!(secs = args.run_for_secs, "running");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(args.run_for_secs)) => {}
            _ = tokio::signal::ctrl_c() => info!("Ctrl-C received"),
        }
    }

    let stats = wheel.stats().await.context("failed to read wheel stats")?;
    wheel.stop().await.context("failed to stop time wheel")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Arm `count` tasks: even ones fire forever, odd ones three times, each at
/// a different multiple of the slot interval.
async fn arm_demo_tasks(wheel: &TimeWheel<String, String>, slot: Duration, count: usize) -> Result<()> {
    for i in 0..count {
        let key = format!("task-{i}");
        let factor = u32::try_from(3 * (i + 1)).unwrap_or(u32::MAX);
        let interval = slot.saturating_mul(factor);
        let runs = if i % 2 == 0 { Runs::Forever } else { Runs::Times(3) };
        wheel
            .add_task(interval, runs, key.clone(), key.clone(), |payload| {
                info!(task = %payload, "fired");
            })
            .await
            .with_context(|| format!("failed to arm {key}"))?;
        info!(task = %key, ?interval, ?runs, "armed");
    }

    // Slow the first task down; it picks up the new interval after its next fire.
    if count > 0 {
        let key = "task-0".to_string();
        wheel
            .update_task(key.clone(), slot.saturating_mul(10), format!("{key} (slowed)"))
            .await
            .context("failed to update task-0")?;
    }
    Ok(())
}
