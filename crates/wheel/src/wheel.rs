//! The slotted wheel and its key registry.
//!
//! [`Wheel`] is a plain single-owner data structure: it has no locks and is
//! never shared. The coordinator owns one and applies every command and tick
//! to it in sequence.
//!
//! Placement works in whole slot intervals. For a delay `d`:
//!
//! ```text
//! steps  = floor(d / interval)
//! pos    = (current_pos + steps) mod slot_count
//! circle = floor(steps / slot_count)
//! ```
//!
//! A task waits out `circle` visits of its slot before it fires, so per-tick
//! work is proportional to the size of one slot no matter how far ahead a
//! task is armed. Delays shorter than one interval truncate to zero steps and
//! fire on the next tick.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::dispatch::Dispatcher;
use crate::error::WheelError;
use crate::stats::{TickReport, WheelStats};
use crate::task::Task;

pub struct Wheel<K, P> {
    interval: Duration,
    slot_count: usize,
    slots: Vec<Vec<Task<K, P>>>,
    /// key -> index of the slot holding that key's task.
    registry: HashMap<K, usize>,
    current_pos: usize,
    counters: WheelStats,
}

impl<K, P> Wheel<K, P>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    P: Clone + Send + 'static,
{
    /// Create an empty wheel with `slot_count` slots of `interval` each.
    pub fn new(interval: Duration, slot_count: usize) -> Result<Self, WheelError> {
        if interval.is_zero() {
            return Err(WheelError::InvalidInterval);
        }
        if slot_count == 0 {
            return Err(WheelError::InvalidSlotCount);
        }
        Ok(Self {
            interval,
            slot_count,
            slots: (0..slot_count).map(|_| Vec::new()).collect(),
            registry: HashMap::new(),
            current_pos: 0,
            counters: WheelStats::default(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn current_pos(&self) -> usize {
        self.current_pos
    }

    /// Number of armed tasks.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.registry.contains_key(key)
    }

    /// Slot index currently holding `key`, if armed.
    pub fn slot_of(&self, key: &K) -> Option<usize> {
        self.registry.get(key).copied()
    }

    /// Number of tasks sitting in slot `index` (0 for out-of-range indices).
    pub fn slot_len(&self, index: usize) -> usize {
        self.slots.get(index).map_or(0, Vec::len)
    }

    /// Whole slot intervals covered by `delay`, truncating any remainder.
    pub fn steps_for(&self, delay: Duration) -> usize {
        let steps = delay.as_nanos() / self.interval.as_nanos();
        usize::try_from(steps).unwrap_or(usize::MAX)
    }

    /// Slot and rotation count for a task added now with `delay`.
    pub fn position_and_circle(&self, delay: Duration) -> (usize, usize) {
        let steps = self.steps_for(delay);
        let pos = (self.current_pos + steps % self.slot_count) % self.slot_count;
        (pos, steps / self.slot_count)
    }

    /// Arm a new task relative to the current cursor.
    pub fn add(&mut self, mut task: Task<K, P>) -> Result<usize, WheelError> {
        if task.interval.is_zero() {
            self.counters.rejected += 1;
            return Err(WheelError::InvalidInterval);
        }
        if task.runs.is_exhausted() {
            self.counters.rejected += 1;
            return Err(WheelError::InvalidRuns);
        }
        if self.registry.contains_key(&task.key) {
            self.counters.rejected += 1;
            return Err(WheelError::DuplicateKey(format!("{:?}", task.key)));
        }

        let (pos, circle) = self.position_and_circle(task.interval);
        task.circle = circle;
        debug!(key = ?task.key, slot = pos, circle, "task armed");
        self.registry.insert(task.key.clone(), pos);
        self.slots[pos].push(task);
        self.counters.added += 1;
        Ok(pos)
    }

    /// Overwrite interval and payload in place.
    ///
    /// The task keeps its slot and circle; the new interval is used the next
    /// time the task is re-armed after firing.
    pub fn update(&mut self, key: &K, interval: Duration, payload: P) -> Result<(), WheelError> {
        if interval.is_zero() {
            self.counters.rejected += 1;
            return Err(WheelError::InvalidInterval);
        }
        let Some(task) = self.find_mut(key) else {
            self.counters.rejected += 1;
            return Err(WheelError::UnknownKey(format!("{key:?}")));
        };
        task.interval = interval;
        task.payload = payload;
        self.counters.updated += 1;
        debug!(key = ?key, ?interval, "task updated");
        Ok(())
    }

    /// Disarm a task that has not fired yet.
    pub fn remove(&mut self, key: &K) -> Result<(), WheelError> {
        let Some(pos) = self.registry.remove(key) else {
            self.counters.rejected += 1;
            return Err(WheelError::UnknownKey(format!("{key:?}")));
        };
        let slot = &mut self.slots[pos];
        slot.retain(|task| task.key != *key);
        self.counters.removed += 1;
        debug!(key = ?key, slot = pos, "task removed");
        Ok(())
    }

    /// Process the slot under the cursor, then advance the cursor.
    ///
    /// The slot is drained before scanning, so a task re-armed onto the same
    /// slot is not visited again until the cursor comes back around.
    pub fn tick(&mut self, dispatcher: &dyn Dispatcher) -> TickReport {
        let pos = self.current_pos;
        let drained = std::mem::take(&mut self.slots[pos]);
        let mut report = TickReport {
            slot: pos,
            ..TickReport::default()
        };

        for mut task in drained {
            if task.runs.is_exhausted() {
                self.registry.remove(&task.key);
                report.evicted += 1;
                continue;
            }
            if task.circle > 0 {
                task.circle -= 1;
                self.slots[pos].push(task);
                report.waiting += 1;
                continue;
            }

            self.registry.remove(&task.key);
            task.runs = task.runs.consume();
            report.fired += 1;
            debug!(key = ?task.key, slot = pos, runs = ?task.runs, "task fired");

            let callback = Arc::clone(&task.callback);
            if task.runs.is_exhausted() {
                let payload = task.payload;
                dispatcher.dispatch(Box::new(move || callback(payload)));
            } else {
                let payload = task.payload.clone();
                dispatcher.dispatch(Box::new(move || callback(payload)));
                self.rearm(task);
                report.rearmed += 1;
            }
        }

        self.current_pos = (pos + 1) % self.slot_count;
        self.counters.ticks += 1;
        self.counters.fired += report.fired as u64;
        self.counters.rearmed += report.rearmed as u64;
        self.counters.evicted += report.evicted as u64;
        trace!(
            slot = pos,
            fired = report.fired,
            waiting = report.waiting,
            "tick processed"
        );
        report
    }

    /// Snapshot of cursor, size and lifetime counters.
    pub fn stats(&self) -> WheelStats {
        WheelStats {
            current_pos: self.current_pos,
            slot_count: self.slot_count,
            interval_ms: u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            armed: self.registry.len(),
            ..self.counters.clone()
        }
    }

    /// Place a task that just fired from the slot under the cursor.
    ///
    /// Its next fire lands exactly `max(steps, 1)` ticks after the current
    /// one, so the period matches the interval even for whole rotations.
    fn rearm(&mut self, mut task: Task<K, P>) {
        let ticks = self.steps_for(task.interval).max(1);
        let pos = (self.current_pos + ticks % self.slot_count) % self.slot_count;
        task.circle = (ticks - 1) / self.slot_count;
        self.registry.insert(task.key.clone(), pos);
        self.slots[pos].push(task);
    }

    fn find_mut(&mut self, key: &K) -> Option<&mut Task<K, P>> {
        let pos = *self.registry.get(key)?;
        self.slots[pos].iter_mut().find(|task| task.key == *key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::dispatch::Job;
    use crate::task::Runs;

    /// Runs jobs on the ticking thread so fires are observable right after `tick`.
    struct Inline;

    impl Dispatcher for Inline {
        fn dispatch(&self, job: Job) {
            job()
        }
        fn name(&self) -> &str {
            "inline"
        }
    }

    type Fired = Arc<Mutex<Vec<String>>>;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn wheel(slots: usize) -> Wheel<&'static str, String> {
        Wheel::new(secs(1), slots).unwrap()
    }

    fn task(key: &'static str, interval: Duration, runs: Runs, fired: &Fired) -> Task<&'static str, String> {
        let log = fired.clone();
        Task::new(
            key,
            interval,
            runs,
            key.to_string(),
            Arc::new(move |payload: String| log.lock().unwrap().push(payload)),
        )
    }

    /// Tick `n` times and return the 1-based tick numbers on which `payload` fired.
    fn fire_ticks(wheel: &mut Wheel<&'static str, String>, fired: &Fired, payload: &str, n: usize) -> Vec<usize> {
        let mut hits = Vec::new();
        for tick in 1..=n {
            wheel.tick(&Inline);
            let mut log = fired.lock().unwrap();
            if log.iter().any(|p| p == payload) {
                hits.push(tick);
            }
            log.clear();
        }
        hits
    }

    #[test]
    fn new_rejects_invalid_parameters() {
        assert!(matches!(
            Wheel::<u32, ()>::new(Duration::ZERO, 8),
            Err(WheelError::InvalidInterval)
        ));
        assert!(matches!(
            Wheel::<u32, ()>::new(secs(1), 0),
            Err(WheelError::InvalidSlotCount)
        ));
    }

    #[test]
    fn new_wheel_is_empty_at_slot_zero() {
        let w = wheel(8);
        assert_eq!(w.current_pos(), 0);
        assert!(w.is_empty());
        assert!((0..8).all(|i| w.slot_len(i) == 0));
        assert_eq!(w.stats().interval_ms, 1000);
    }

    #[test]
    fn placement_follows_steps_and_rotations() {
        let w = wheel(8);
        assert_eq!(w.position_and_circle(secs(3)), (3, 0));
        assert_eq!(w.position_and_circle(secs(8)), (0, 1));
        assert_eq!(w.position_and_circle(secs(20)), (4, 2));
        // Sub-interval remainders truncate.
        assert_eq!(w.position_and_circle(Duration::from_millis(3_999)), (3, 0));
        assert_eq!(w.position_and_circle(Duration::from_millis(500)), (0, 0));
    }

    #[test]
    fn placement_is_relative_to_cursor() {
        let mut w = wheel(8);
        for _ in 0..5 {
            w.tick(&Inline);
        }
        assert_eq!(w.current_pos(), 5);
        assert_eq!(w.position_and_circle(secs(4)), (1, 0));
        assert_eq!(w.position_and_circle(secs(11)), (0, 1));
    }

    #[test]
    fn cursor_wraps_around() {
        let mut w = wheel(3);
        for _ in 0..7 {
            w.tick(&Inline);
        }
        assert_eq!(w.current_pos(), 1);
        assert_eq!(w.stats().ticks, 7);
    }

    #[test]
    fn one_shot_fires_after_its_steps() {
        let fired = Fired::default();
        let mut w = wheel(8);
        let pos = w.add(task("a", secs(3), Runs::ONCE, &fired)).unwrap();
        assert_eq!(pos, 3);
        assert_eq!(w.slot_of(&"a"), Some(3));

        assert_eq!(fire_ticks(&mut w, &fired, "a", 10), vec![4]);
        assert!(!w.contains(&"a"));
        assert_eq!(w.slot_len(3), 0);
    }

    #[test]
    fn sub_interval_delay_fires_next_tick() {
        let fired = Fired::default();
        let mut w = wheel(8);
        w.add(task("a", Duration::from_millis(10), Runs::ONCE, &fired)).unwrap();
        assert_eq!(fire_ticks(&mut w, &fired, "a", 3), vec![1]);
    }

    #[test]
    fn task_whole_rotations_away_never_fires_early() {
        let fired = Fired::default();
        let mut w = wheel(4);
        // Exactly two rotations: lands on the cursor's slot with circle 2.
        w.add(task("a", secs(8), Runs::ONCE, &fired)).unwrap();
        assert_eq!(w.slot_of(&"a"), Some(0));

        assert_eq!(fire_ticks(&mut w, &fired, "a", 12), vec![9]);
    }

    #[test]
    fn waiting_task_keeps_registry_entry() {
        let fired = Fired::default();
        let mut w = wheel(4);
        w.add(task("a", secs(6), Runs::ONCE, &fired)).unwrap();
        for _ in 0..3 {
            let report = w.tick(&Inline);
            assert_eq!(report.fired, 0);
        }
        let report = w.tick(&Inline);
        assert_eq!(report.slot, 3);
        assert_eq!(report.waiting, 0);
        assert_eq!(w.slot_of(&"a"), Some(2));
    }

    #[test]
    fn finite_runs_fire_exactly_that_many_times() {
        let fired = Fired::default();
        let mut w = wheel(8);
        w.add(task("a", secs(2), Runs::Times(3), &fired)).unwrap();

        assert_eq!(fire_ticks(&mut w, &fired, "a", 20), vec![3, 5, 7]);
        assert!(!w.contains(&"a"));
        assert!((0..8).all(|i| w.slot_len(i) == 0));

        let stats = w.stats();
        assert_eq!(stats.fired, 3);
        assert_eq!(stats.rearmed, 2);
    }

    #[test]
    fn forever_task_keeps_firing_until_removed() {
        let fired = Fired::default();
        let mut w = wheel(4);
        w.add(task("a", secs(3), Runs::Forever, &fired)).unwrap();

        assert_eq!(fire_ticks(&mut w, &fired, "a", 12), vec![4, 7, 10]);
        assert!(w.contains(&"a"));

        w.remove(&"a").unwrap();
        assert!(fire_ticks(&mut w, &fired, "a", 12).is_empty());
        assert!(w.is_empty());
    }

    #[test]
    fn periodic_full_rotation_keeps_its_period() {
        let fired = Fired::default();
        let mut w = wheel(4);
        w.add(task("a", secs(4), Runs::Forever, &fired)).unwrap();
        assert_eq!(fire_ticks(&mut w, &fired, "a", 14), vec![5, 9, 13]);
    }

    #[test]
    fn sub_interval_periodic_fires_once_per_tick() {
        let fired = Fired::default();
        let mut w = wheel(4);
        w.add(task("a", Duration::from_millis(1), Runs::Forever, &fired)).unwrap();
        for _ in 0..6 {
            let report = w.tick(&Inline);
            assert_eq!(report.fired, 1);
        }
        assert_eq!(fired.lock().unwrap().len(), 6);
    }

    #[test]
    fn remove_before_due_cancels() {
        let fired = Fired::default();
        let mut w = wheel(8);
        w.add(task("a", secs(2), Runs::ONCE, &fired)).unwrap();
        w.tick(&Inline);
        w.remove(&"a").unwrap();

        assert!(fire_ticks(&mut w, &fired, "a", 16).is_empty());
        assert!(!w.contains(&"a"));
        assert_eq!(w.stats().removed, 1);
    }

    #[test]
    fn remove_unknown_key_is_rejected() {
        let mut w = wheel(8);
        assert!(matches!(w.remove(&"ghost"), Err(WheelError::UnknownKey(_))));
        assert_eq!(w.stats().rejected, 1);
    }

    #[test]
    fn remove_leaves_slot_neighbours_alone() {
        let fired = Fired::default();
        let mut w = wheel(8);
        w.add(task("a", secs(2), Runs::ONCE, &fired)).unwrap();
        w.add(task("b", secs(2), Runs::ONCE, &fired)).unwrap();
        assert_eq!(w.slot_len(2), 2);

        w.remove(&"a").unwrap();
        assert_eq!(w.slot_len(2), 1);
        assert_eq!(fire_ticks(&mut w, &fired, "b", 3), vec![3]);
    }

    #[test]
    fn update_unknown_key_changes_nothing() {
        let fired = Fired::default();
        let mut w = wheel(8);
        w.add(task("a", secs(2), Runs::ONCE, &fired)).unwrap();
        w.tick(&Inline);
        let before = w.stats();

        let err = w.update(&"ghost", secs(5), "x".to_string()).unwrap_err();
        assert!(matches!(err, WheelError::UnknownKey(_)));

        let after = w.stats();
        assert_eq!(after.current_pos, before.current_pos);
        assert_eq!(after.armed, before.armed);
        assert_eq!(after.updated, before.updated);
        assert_eq!(w.slot_of(&"a"), Some(2));
    }

    #[test]
    fn update_applies_after_next_fire_without_moving() {
        let fired = Fired::default();
        let mut w = wheel(8);
        w.add(task("a", secs(2), Runs::Times(2), &fired)).unwrap();
        w.update(&"a", secs(5), "a".to_string()).unwrap();
        assert_eq!(w.slot_of(&"a"), Some(2));

        // First fire on the old schedule, second five ticks later.
        assert_eq!(fire_ticks(&mut w, &fired, "a", 12), vec![3, 8]);
    }

    #[test]
    fn update_replaces_payload() {
        let fired = Fired::default();
        let mut w = wheel(8);
        w.add(task("a", secs(1), Runs::ONCE, &fired)).unwrap();
        w.update(&"a", secs(1), "patched".to_string()).unwrap();
        w.tick(&Inline);
        w.tick(&Inline);
        assert_eq!(*fired.lock().unwrap(), vec!["patched".to_string()]);
    }

    #[test]
    fn update_rejects_zero_interval() {
        let fired = Fired::default();
        let mut w = wheel(8);
        w.add(task("a", secs(1), Runs::ONCE, &fired)).unwrap();
        assert!(matches!(
            w.update(&"a", Duration::ZERO, "a".to_string()),
            Err(WheelError::InvalidInterval)
        ));
    }

    #[test]
    fn add_rejects_invalid_tasks() {
        let fired = Fired::default();
        let mut w = wheel(8);
        assert!(matches!(
            w.add(task("a", Duration::ZERO, Runs::ONCE, &fired)),
            Err(WheelError::InvalidInterval)
        ));
        assert!(matches!(
            w.add(task("a", secs(1), Runs::Times(0), &fired)),
            Err(WheelError::InvalidRuns)
        ));
        w.add(task("a", secs(1), Runs::ONCE, &fired)).unwrap();
        assert!(matches!(
            w.add(task("a", secs(4), Runs::ONCE, &fired)),
            Err(WheelError::DuplicateKey(_))
        ));
        assert_eq!(w.len(), 1);
        assert_eq!(w.slot_of(&"a"), Some(1));
        assert_eq!(w.stats().rejected, 3);
    }

    #[test]
    fn exhausted_task_is_evicted_without_firing() {
        let fired = Fired::default();
        let mut w = wheel(4);
        let mut stale = task("a", secs(1), Runs::Times(0), &fired);
        stale.circle = 0;
        w.registry.insert("a", 0);
        w.slots[0].push(stale);

        let report = w.tick(&Inline);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.fired, 0);
        assert!(fired.lock().unwrap().is_empty());
        assert!(!w.contains(&"a"));
    }

    #[test]
    fn slot_tasks_fire_together() {
        let fired = Fired::default();
        let mut w = wheel(8);
        for key in ["a", "b", "c"] {
            w.add(task(key, secs(1), Runs::ONCE, &fired)).unwrap();
        }
        w.tick(&Inline);
        let report = w.tick(&Inline);
        assert_eq!(report.fired, 3);
        let mut log = fired.lock().unwrap().clone();
        log.sort();
        assert_eq!(log, vec!["a", "b", "c"]);
    }
}
