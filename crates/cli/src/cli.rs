use std::path::PathBuf;

use clap::Parser;
use slotwheel::{WheelConfig, WheelError};

/// Demo driver for the slotwheel timing wheel.
///
/// Starts a wheel, arms a handful of one-shot and periodic tasks, logs every
/// fire and prints the final wheel stats as JSON.
#[derive(Parser, Debug)]
#[command(name = "slotwheel-demo", version, about = "Demo driver for the slotwheel timing wheel")]
pub struct CliArgs {
    /// Path to a wheel TOML config (default: SLOTWHEEL_* env vars)
    #[arg(long, env = "SLOTWHEEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Slot interval override in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Slot count override
    #[arg(long)]
    pub slots: Option<usize>,

    /// Callback pool size override (0 = spawn per callback)
    #[arg(long)]
    pub pool_threads: Option<usize>,

    /// Number of demo tasks to arm
    #[arg(long, default_value_t = 5)]
    pub tasks: usize,

    /// Seconds to run before stopping (0 = until Ctrl-C)
    #[arg(long, default_value_t = 10)]
    pub run_for_secs: u64,
}

impl CliArgs {
    /// Load the base config from file or env, then apply flag overrides.
    pub fn resolve_config(&self) -> Result<WheelConfig, WheelError> {
        let mut config = match &self.config {
            Some(path) => WheelConfig::from_file(path)?,
            None => WheelConfig::from_env()?,
        };
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
        if let Some(slots) = self.slots {
            config.slots = slots;
        }
        if let Some(threads) = self.pool_threads {
            config.dispatch_threads = threads;
        }
        config.validate()?;
        Ok(config)
    }
}
