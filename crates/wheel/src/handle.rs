//! Public, cloneable entry point to a running wheel.
//!
//! [`TimeWheel`] never touches wheel state directly. Every operation is a
//! message to the coordinator task, answered once the coordinator has
//! applied it, so each call returns the real outcome of the command.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::WheelConfig;
use crate::coordinator::{Command, Coordinator};
use crate::dispatch::{Dispatcher, PoolDispatcher, SpawnDispatcher};
use crate::error::WheelError;
use crate::stats::WheelStats;
use crate::task::{Runs, Task};
use crate::tick::{interval_ticks, TickSource};
use crate::wheel::Wheel;

/// Default capacity of the command queue between handles and the coordinator.
pub const DEFAULT_COMMAND_BUFFER: usize = 1024;

enum Lifecycle<K, P> {
    /// Created; the coordinator waits here until `start`.
    Idle(Coordinator<K, P>),
    Running {
        shutdown: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Handle to a timing wheel driven by its own coordinator task.
///
/// Clones share the same wheel.
pub struct TimeWheel<K, P> {
    interval: Duration,
    slot_count: usize,
    commands: mpsc::Sender<Command<K, P>>,
    lifecycle: Arc<Mutex<Lifecycle<K, P>>>,
}

impl<K, P> Clone for TimeWheel<K, P> {
    fn clone(&self) -> Self {
        Self {
            interval: self.interval,
            slot_count: self.slot_count,
            commands: self.commands.clone(),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl<K, P> TimeWheel<K, P>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    P: Clone + Send + 'static,
{
    /// Create a wheel with `slot_count` slots of `interval` each, dispatching
    /// callbacks with [`SpawnDispatcher`].
    pub fn new(interval: Duration, slot_count: usize) -> Result<Self, WheelError> {
        Self::with_dispatcher(
            interval,
            slot_count,
            DEFAULT_COMMAND_BUFFER,
            Arc::new(SpawnDispatcher),
        )
    }

    /// Create a wheel from validated config.
    pub fn from_config(config: &WheelConfig) -> Result<Self, WheelError> {
        config.validate()?;
        let dispatcher: Arc<dyn Dispatcher> = if config.dispatch_threads == 0 {
            Arc::new(SpawnDispatcher)
        } else {
            Arc::new(PoolDispatcher::new(config.dispatch_threads)?)
        };
        Self::with_dispatcher(config.interval(), config.slots, config.command_buffer, dispatcher)
    }

    pub fn with_dispatcher(
        interval: Duration,
        slot_count: usize,
        command_buffer: usize,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, WheelError> {
        let wheel = Wheel::new(interval, slot_count)?;
        if command_buffer == 0 {
            return Err(WheelError::Config(
                "command buffer must hold at least one command".to_string(),
            ));
        }
        let (commands, receiver) = mpsc::channel(command_buffer);
        let coordinator = Coordinator::new(wheel, dispatcher, receiver);
        Ok(Self {
            interval,
            slot_count,
            commands,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Idle(coordinator))),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the coordinator on the current tokio runtime, ticking once per
    /// slot interval.
    pub fn start(&self) -> Result<(), WheelError> {
        // Building the interval registers a timer, which panics outside a runtime.
        Handle::try_current().map_err(|_| WheelError::NoRuntime)?;
        self.start_with(interval_ticks(self.interval))
    }

    /// Start the coordinator with a caller-provided tick source.
    ///
    /// A wheel starts at most once: `AlreadyStarted` while running, `Stopped`
    /// after it stopped.
    pub fn start_with<T: TickSource>(&self, ticks: T) -> Result<(), WheelError> {
        let runtime = Handle::try_current().map_err(|_| WheelError::NoRuntime)?;
        let mut state = self.lock();
        let coordinator = match std::mem::replace(&mut *state, Lifecycle::Stopped) {
            Lifecycle::Idle(coordinator) => coordinator,
            running @ Lifecycle::Running { .. } => {
                *state = running;
                return Err(WheelError::AlreadyStarted);
            }
            Lifecycle::Stopped => return Err(WheelError::Stopped),
        };

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(coordinator.run(ticks, shutdown_rx));
        *state = Lifecycle::Running { shutdown, handle };
        info!(slots = self.slot_count, interval = ?self.interval, "time wheel started");
        Ok(())
    }

    /// Stop the coordinator and wait for its loop to exit.
    ///
    /// Armed tasks are dropped without firing. Callbacks already dispatched
    /// keep running.
    pub async fn stop(&self) -> Result<(), WheelError> {
        let (shutdown, handle) = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, Lifecycle::Stopped) {
                Lifecycle::Running { shutdown, handle } => (shutdown, handle),
                idle @ Lifecycle::Idle(_) => {
                    *state = idle;
                    return Err(WheelError::NotStarted);
                }
                Lifecycle::Stopped => return Err(WheelError::Stopped),
            }
        };

        // The loop may already have exited on its own; that is still a stop.
        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "coordinator task ended abnormally");
        }
        info!("time wheel stopped");
        Ok(())
    }

    /// Whether the coordinator loop is alive. Turns false as soon as the
    /// loop exits, including when the tick source ends on its own.
    pub fn is_running(&self) -> bool {
        matches!(&*self.lock(), Lifecycle::Running { handle, .. } if !handle.is_finished())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Arm `callback` to fire with `payload` after `interval`, `runs` times.
    pub async fn add_task<F>(
        &self,
        interval: Duration,
        runs: Runs,
        key: K,
        payload: P,
        callback: F,
    ) -> Result<(), WheelError>
    where
        F: Fn(P) + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(WheelError::InvalidInterval);
        }
        if runs.is_exhausted() {
            return Err(WheelError::InvalidRuns);
        }
        let task = Task::new(key, interval, runs, payload, Arc::new(callback));
        self.request(|reply| Command::Add { task, reply }).await?
    }

    /// Replace the interval and payload of an armed task.
    ///
    /// The task is not moved: it fires at its current slot, and the new
    /// interval is used from the re-arm after that fire.
    pub async fn update_task(&self, key: K, interval: Duration, payload: P) -> Result<(), WheelError> {
        self.request(|reply| Command::Update {
            key,
            interval,
            payload,
            reply,
        })
        .await?
    }

    /// Cancel a task that has not been dispatched yet.
    pub async fn remove_task(&self, key: K) -> Result<(), WheelError> {
        self.request(|reply| Command::Remove { key, reply }).await?
    }

    /// Whether `key` is currently armed.
    pub async fn contains(&self, key: K) -> Result<bool, WheelError> {
        self.request(|reply| Command::Contains { key, reply }).await
    }

    pub async fn stats(&self) -> Result<WheelStats, WheelError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command<K, P>,
    ) -> Result<T, WheelError> {
        self.ensure_running()?;
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| WheelError::Stopped)?;
        response.await.map_err(|_| WheelError::Stopped)
    }

    fn ensure_running(&self) -> Result<(), WheelError> {
        match &*self.lock() {
            Lifecycle::Running { handle, .. } if handle.is_finished() => Err(WheelError::Stopped),
            Lifecycle::Running { .. } => Ok(()),
            Lifecycle::Idle(_) => Err(WheelError::NotStarted),
            Lifecycle::Stopped => Err(WheelError::Stopped),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle<K, P>> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
