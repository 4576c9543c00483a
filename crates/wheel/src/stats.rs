use serde::Serialize;

/// Snapshot of wheel state and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WheelStats {
    /// Slot the next tick will process.
    pub current_pos: usize,
    pub slot_count: usize,
    /// Duration of one slot, in milliseconds.
    pub interval_ms: u64,
    /// Tasks currently armed (registry size).
    pub armed: usize,
    /// Ticks processed since creation.
    pub ticks: u64,
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    /// Commands rejected with an error.
    pub rejected: u64,
    /// Callbacks handed to the dispatcher.
    pub fired: u64,
    /// Periodic tasks placed back on the wheel after firing.
    pub rearmed: u64,
    /// Exhausted tasks dropped without firing.
    pub evicted: u64,
}

/// What a single tick did to the slot under the cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub slot: usize,
    pub fired: usize,
    pub rearmed: usize,
    pub evicted: usize,
    /// Tasks left in the slot with rotations still to wait.
    pub waiting: usize,
}
