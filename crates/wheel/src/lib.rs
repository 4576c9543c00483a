//! Slotted timing wheel with a single-writer coordinator.
//!
//! A fixed ring of slots, each holding the tasks due when the cursor reaches
//! it. Adding, cancelling and scanning are O(1) in how far ahead a task is
//! armed; distant tasks carry a rotation count instead of a deadline.
//!
//! All mutation goes through one coordinator task per wheel. [`TimeWheel`]
//! handles send it commands and get the outcome back, so no state is ever
//! shared behind a lock. Due callbacks are handed to a [`Dispatcher`] and
//! never awaited.
//!
//! ```ignore
//! let wheel: TimeWheel<&str, u32> = TimeWheel::new(Duration::from_millis(100), 60)?;
//! wheel.start()?;
//! wheel
//!     .add_task(Duration::from_secs(2), Runs::Forever, "heartbeat", 7, |n| println!("beat {n}"))
//!     .await?;
//! wheel.remove_task("heartbeat").await?;
//! wheel.stop().await?;
//! ```

pub mod config;
mod coordinator;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod stats;
pub mod task;
pub mod tick;
pub mod wheel;

pub use config::{load_dotenv, WheelConfig};
pub use dispatch::{Dispatcher, Job, PoolDispatcher, SpawnDispatcher};
pub use error::WheelError;
pub use handle::{TimeWheel, DEFAULT_COMMAND_BUFFER};
pub use stats::{TickReport, WheelStats};
pub use task::{Callback, Runs, Task};
pub use tick::{interval_ticks, TickSource};
pub use wheel::Wheel;
