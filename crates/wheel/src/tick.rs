//! Periodic tick signal driving the coordinator.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Source of tick events. Each completed `next_tick` advances the wheel by one slot.
#[async_trait]
pub trait TickSource: Send + 'static {
    /// Wait for the next tick. `false` means the source is exhausted and the
    /// coordinator should stop.
    async fn next_tick(&mut self) -> bool;
}

/// Wall-clock ticks every `period`, starting one period from now.
///
/// Late ticks are skipped rather than queued, so a slow tick coalesces with
/// the ones it overran.
pub fn interval_ticks(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[async_trait]
impl TickSource for Interval {
    async fn next_tick(&mut self) -> bool {
        self.tick().await;
        true
    }
}

/// Manually driven ticks: every `()` received is one tick.
#[async_trait]
impl TickSource for mpsc::Receiver<()> {
    async fn next_tick(&mut self) -> bool {
        self.recv().await.is_some()
    }
}
