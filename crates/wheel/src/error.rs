//! Wheel error types.

use thiserror::Error;

/// Errors returned by wheel construction, commands and configuration.
#[derive(Debug, Error)]
pub enum WheelError {
    #[error("interval must be greater than zero")]
    InvalidInterval,

    #[error("slot count must be greater than zero")]
    InvalidSlotCount,

    #[error("run count must be at least one")]
    InvalidRuns,

    #[error("task already armed: {0}")]
    DuplicateKey(String),

    #[error("no armed task with key: {0}")]
    UnknownKey(String),

    #[error("wheel has not been started")]
    NotStarted,

    #[error("wheel is already running")]
    AlreadyStarted,

    #[error("wheel is stopped")]
    Stopped,

    #[error("no tokio runtime available to run the coordinator")]
    NoRuntime,

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
