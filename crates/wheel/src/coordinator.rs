//! Single-writer event loop owning the wheel.
//!
//! The coordinator is the only code that touches [`Wheel`] state. It waits on
//! three event sources and handles exactly one event at a time:
//! 1. **Shutdown** — one-shot stop signal, checked first
//! 2. **Tick** — scan the slot under the cursor and advance
//! 3. **Command** — add/update/remove/query from a [`TimeWheel`](crate::TimeWheel) handle

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::error::WheelError;
use crate::stats::WheelStats;
use crate::task::Task;
use crate::tick::TickSource;
use crate::wheel::Wheel;

type Reply<T> = oneshot::Sender<Result<T, WheelError>>;

/// A request sent from a handle to the coordinator, with its reply channel.
pub(crate) enum Command<K, P> {
    Add {
        task: Task<K, P>,
        reply: Reply<()>,
    },
    Update {
        key: K,
        interval: Duration,
        payload: P,
        reply: Reply<()>,
    },
    Remove {
        key: K,
        reply: Reply<()>,
    },
    Contains {
        key: K,
        reply: oneshot::Sender<bool>,
    },
    Stats {
        reply: oneshot::Sender<WheelStats>,
    },
}

pub(crate) struct Coordinator<K, P> {
    wheel: Wheel<K, P>,
    dispatcher: Arc<dyn Dispatcher>,
    commands: mpsc::Receiver<Command<K, P>>,
}

impl<K, P> Coordinator<K, P>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    P: Clone + Send + 'static,
{
    pub(crate) fn new(
        wheel: Wheel<K, P>,
        dispatcher: Arc<dyn Dispatcher>,
        commands: mpsc::Receiver<Command<K, P>>,
    ) -> Self {
        Self {
            wheel,
            dispatcher,
            commands,
        }
    }

    /// Run until shutdown is signalled, the tick source ends, or every handle is dropped.
    pub(crate) async fn run<T: TickSource>(mut self, mut ticks: T, mut shutdown: oneshot::Receiver<()>) {
        info!(
            slots = self.wheel.slot_count(),
            interval = ?self.wheel.interval(),
            dispatcher = self.dispatcher.name(),
            "coordinator running"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
                alive = ticks.next_tick() => {
                    if !alive {
                        info!("tick source closed");
                        break;
                    }
                    self.wheel.tick(&*self.dispatcher);
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        info!("all wheel handles dropped");
                        break;
                    }
                },
            }
        }

        let stats = self.wheel.stats();
        info!(
            armed = stats.armed,
            ticks = stats.ticks,
            fired = stats.fired,
            "coordinator stopped"
        );
    }

    fn apply(&mut self, command: Command<K, P>) {
        match command {
            Command::Add { task, reply } => {
                let result = self.wheel.add(task).map(|_| ());
                respond("add", result, reply);
            }
            Command::Update {
                key,
                interval,
                payload,
                reply,
            } => {
                let result = self.wheel.update(&key, interval, payload);
                respond("update", result, reply);
            }
            Command::Remove { key, reply } => {
                let result = self.wheel.remove(&key);
                respond("remove", result, reply);
            }
            Command::Contains { key, reply } => {
                let _ = reply.send(self.wheel.contains(&key));
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.wheel.stats());
            }
        }
    }
}

/// Log a rejected command and hand the result back. A caller that gave up
/// waiting is not an error.
fn respond(op: &str, result: Result<(), WheelError>, reply: Reply<()>) {
    if let Err(e) = &result {
        warn!(op, error = %e, "command rejected");
    }
    let _ = reply.send(result);
}
