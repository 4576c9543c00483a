//! Armed task records and their run budget.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked with the task payload each time the task fires.
pub type Callback<P> = Arc<dyn Fn(P) + Send + Sync>;

/// How many more times a task may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runs {
    /// Fire this many more times, counting the next fire.
    Times(u32),
    /// Re-arm after every fire until removed.
    Forever,
}

impl Runs {
    /// Budget for a task that fires once.
    pub const ONCE: Runs = Runs::Times(1);

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Runs::Times(0))
    }

    /// Consume one fire, returning the budget left afterwards.
    pub fn consume(self) -> Runs {
        match self {
            Runs::Times(n) => Runs::Times(n.saturating_sub(1)),
            Runs::Forever => Runs::Forever,
        }
    }
}

/// One armed callback and its scheduling state.
///
/// Owned exclusively by the wheel; callers only ever see keys.
pub struct Task<K, P> {
    pub key: K,
    pub interval: Duration,
    pub runs: Runs,
    /// Full rotations still to wait before the task is eligible in its slot.
    pub circle: usize,
    pub payload: P,
    pub callback: Callback<P>,
}

impl<K, P> Task<K, P> {
    pub fn new(key: K, interval: Duration, runs: Runs, payload: P, callback: Callback<P>) -> Self {
        Self {
            key,
            interval,
            runs,
            circle: 0,
            payload,
            callback,
        }
    }
}

impl<K: fmt::Debug, P> fmt::Debug for Task<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("key", &self.key)
            .field("interval", &self.interval)
            .field("runs", &self.runs)
            .field("circle", &self.circle)
            .finish_non_exhaustive()
    }
}
