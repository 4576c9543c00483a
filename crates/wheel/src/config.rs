//! Wheel configuration from TOML or environment variables.
//!
//! Environment keys (all optional, `.env` is honoured via [`load_dotenv`]):
//! `SLOTWHEEL_INTERVAL_MS`, `SLOTWHEEL_SLOTS`, `SLOTWHEEL_COMMAND_BUFFER`,
//! `SLOTWHEEL_DISPATCH_THREADS`.

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WheelError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse `key` from the environment, falling back to `default` when unset or malformed.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env_opt(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparsable env value");
            default
        }),
        None => default,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelConfig {
    /// Duration of one slot in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Number of slots in one rotation.
    #[serde(default = "default_slots")]
    pub slots: usize,
    /// Commands that may queue for the coordinator before callers wait.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Callback threads. 0 = one blocking task per callback, no bound.
    #[serde(default)]
    pub dispatch_threads: usize,
}

fn default_interval_ms() -> u64 { 100 }
fn default_slots() -> usize { 60 }
fn default_command_buffer() -> usize { crate::handle::DEFAULT_COMMAND_BUFFER }

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            slots: default_slots(),
            command_buffer: default_command_buffer(),
            dispatch_threads: 0,
        }
    }
}

impl WheelConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, WheelError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WheelError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Build config from `SLOTWHEEL_*` env vars (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, WheelError> {
        let defaults = Self::default();
        let config = Self {
            interval_ms: env_parse("SLOTWHEEL_INTERVAL_MS", defaults.interval_ms),
            slots: env_parse("SLOTWHEEL_SLOTS", defaults.slots),
            command_buffer: env_parse("SLOTWHEEL_COMMAND_BUFFER", defaults.command_buffer),
            dispatch_threads: env_parse("SLOTWHEEL_DISPATCH_THREADS", defaults.dispatch_threads),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WheelError> {
        if self.interval_ms == 0 {
            return Err(WheelError::InvalidInterval);
        }
        if self.slots == 0 {
            return Err(WheelError::InvalidSlotCount);
        }
        if self.command_buffer == 0 {
            return Err(WheelError::Config(
                "command_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Time covered by one full rotation.
    pub fn horizon(&self) -> Duration {
        self.interval().saturating_mul(u32::try_from(self.slots).unwrap_or(u32::MAX))
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Wheel config:");
        tracing::info!("  interval:    {}ms x {} slots ({:?} per rotation)", self.interval_ms, self.slots, self.horizon());
        tracing::info!("  commands:    buffer={}", self.command_buffer);
        if self.dispatch_threads == 0 {
            tracing::info!("  dispatch:    spawn per callback");
        } else {
            tracing::info!("  dispatch:    pool of {} threads", self.dispatch_threads);
        }
    }
}
