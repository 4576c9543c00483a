//! Fire-and-forget callback dispatch.
//!
//! The coordinator hands every due callback to a [`Dispatcher`] and moves on;
//! it never waits for a callback and never sees its outcome. Two
//! implementations are provided:
//! - [`SpawnDispatcher`]: one `spawn_blocking` unit per callback (default)
//! - [`PoolDispatcher`]: a fixed-size rayon pool for bounded concurrency

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::error::WheelError;

/// A due callback bound to its payload, ready to run.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs due callbacks without blocking the caller.
pub trait Dispatcher: Send + Sync {
    /// Launch `job` as an independent unit of work and return immediately.
    fn dispatch(&self, job: Job);

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Run a job, swallowing and logging a panic so it never crosses into the wheel.
fn run_contained(job: Job) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        warn!(reason = %reason, "task callback panicked");
    }
}

// ── SpawnDispatcher ──────────────────────────────────────────────────

/// Spawns each callback on tokio's blocking pool.
///
/// Must be driven from inside a tokio runtime, which the coordinator always is.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpawnDispatcher;

impl Dispatcher for SpawnDispatcher {
    fn dispatch(&self, job: Job) {
        // The join handle is dropped on purpose: completion is never observed.
        tokio::task::spawn_blocking(move || run_contained(job));
    }

    fn name(&self) -> &str {
        "spawn"
    }
}

// ── PoolDispatcher ───────────────────────────────────────────────────

/// Runs callbacks on a fixed-size rayon thread pool.
///
/// At most `threads` callbacks execute at once; the rest queue inside the pool.
pub struct PoolDispatcher {
    pool: rayon::ThreadPool,
}

impl PoolDispatcher {
    pub fn new(threads: usize) -> Result<Self, WheelError> {
        if threads == 0 {
            return Err(WheelError::Config(
                "dispatch pool needs at least one thread".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("slotwheel-dispatch-{i}"))
            .build()
            .map_err(|e| WheelError::Config(format!("failed to build dispatch pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Dispatcher for PoolDispatcher {
    fn dispatch(&self, job: Job) {
        self.pool.spawn(move || run_contained(job));
    }

    fn name(&self) -> &str {
        "pool"
    }
}
