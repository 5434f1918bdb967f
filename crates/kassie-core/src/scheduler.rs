//! Delay-based task queue.
//!
//! Long actions never block the tick loop: they schedule a follow-up task
//! and return. Tasks due at the same time run in the order they were
//! scheduled. There is no cancellation; a follow-up checks the world state
//! when it runs and does nothing if the action was abandoned.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use kassie_logic::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Write the whole world, then reschedule.
    PeriodicFlush,
    /// Write the dirty queue, then reschedule.
    DirtyFlush,
    /// Advance every ship, then reschedule.
    ShipTick,
    FinishHoist { character: EntityId, room: EntityId },
    FinishFold { character: EntityId, room: EntityId },
}

#[derive(Debug)]
struct Scheduled {
    due: f64,
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed: the heap pops the earliest task first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: f64,
    seq: u64,
    queue: BinaryHeap<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the clock at `now`, e.g. a clock restored from disk.
    pub fn starting_at(now: f64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    /// Current simulated time, in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Runs `task` after `delay` seconds. Negative delays mean "now".
    pub fn schedule(&mut self, delay: f64, task: Task) {
        let due = self.now + delay.max(0.0);
        self.seq += 1;
        self.queue.push(Scheduled {
            due,
            seq: self.seq,
            task,
        });
    }

    /// True when a task equal to `task` is waiting.
    pub fn is_scheduled(&self, task: &Task) -> bool {
        self.queue.iter().any(|s| &s.task == task)
    }

    /// Moves the clock to `time` and returns every task due by then,
    /// earliest first. The clock never goes backwards.
    pub fn advance_to(&mut self, time: f64) -> Vec<(f64, Task)> {
        let time = time.max(self.now);
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|s| s.due <= time) {
            if let Some(s) = self.queue.pop() {
                due.push((s.due, s.task));
            }
        }
        self.now = time;
        due
    }

    /// Pops the next task due by `time`, moving the clock to its due time.
    /// Tasks scheduled while handling it are seen by the next call.
    pub fn next_due(&mut self, time: f64) -> Option<Task> {
        if !self.queue.peek().is_some_and(|s| s.due <= time) {
            return None;
        }
        let s = self.queue.pop()?;
        self.now = self.now.max(s.due);
        Some(s.task)
    }

    /// Moves the clock to `time` without running anything.
    pub fn set_now(&mut self, time: f64) {
        self.now = self.now.max(time);
    }
}
