#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cancellable periodic tasks on a logical clock.
//!
//! Every periodic loop in the map (the playback interval and the highlight
//! pulse) is registered here and addressed by the [`TaskHandle`] returned
//! from [`Scheduler::start`]. Cancelling a handle removes the task at once,
//! so a cancelled loop can never fire again.
//!
//! Time is logical: the owner advances the clock explicitly and drains due
//! firings one at a time with [`Scheduler::pop_due`]. Handling a firing may
//! start or cancel other tasks, and those changes are visible to the very
//! next `pop_due` call.

use std::collections::BTreeMap;
use std::time::Duration;

use strum_macros::{AsRefStr, Display};

/// Opaque token identifying one started task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// What a task drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TaskKind {
    /// Timeline playback interval.
    PlaybackTick,
    /// One frame of the selected-area highlight pulse.
    HighlightFrame,
}

#[derive(Debug, Clone, Copy)]
struct Task {
    kind: TaskKind,
    period: Duration,
    next_due: Duration,
}

/// A task that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firing {
    pub handle: TaskHandle,
    pub kind: TaskKind,
    /// Logical time the firing was due at.
    pub at: Duration,
}

/// Registry of active periodic tasks.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    next_id: u64,
    tasks: BTreeMap<TaskHandle, Task>,
}

/// Shortest accepted period; zero periods are raised to this.
const MIN_PERIOD: Duration = Duration::from_millis(1);

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Starts a periodic task whose first firing is one `period` from now.
    pub fn start(&mut self, kind: TaskKind, period: Duration) -> TaskHandle {
        let period = period.max(MIN_PERIOD);
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        self.tasks.insert(
            handle,
            Task {
                kind,
                period,
                next_due: self.now + period,
            },
        );
        log::debug!(
            "Started {kind} task {} every {}ms",
            handle.0,
            period.as_millis()
        );
        handle
    }

    /// Cancels a task. Returns `false` if it was not active.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let removed = self.tasks.remove(&handle);
        if let Some(task) = removed {
            log::debug!("Cancelled {} task {}", task.kind, handle.0);
        }
        removed.is_some()
    }

    #[must_use]
    pub fn is_active(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of active tasks of `kind`.
    #[must_use]
    pub fn active_of(&self, kind: TaskKind) -> usize {
        self.tasks.values().filter(|task| task.kind == kind).count()
    }

    /// Earliest pending due time.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.tasks.values().map(|task| task.next_due).min()
    }

    /// Pops the earliest firing due at or before `until`.
    ///
    /// The clock moves to the firing time and the task is rescheduled one
    /// period later. Ties go to the task started first.
    pub fn pop_due(&mut self, until: Duration) -> Option<Firing> {
        let (handle, task) = self
            .tasks
            .iter_mut()
            .filter(|(_, task)| task.next_due <= until)
            .min_by_key(|(handle, task)| (task.next_due, **handle))?;

        let at = task.next_due;
        task.next_due += task.period;
        let firing = Firing {
            handle: *handle,
            kind: task.kind,
            at,
        };
        self.now = self.now.max(at);
        Some(firing)
    }

    /// Moves the clock to `until` once all due firings are drained.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    /// Cancels everything.
    pub fn clear(&mut self) {
        if !self.tasks.is_empty() {
            log::debug!("Cancelling {} scheduled tasks", self.tasks.len());
        }
        self.tasks.clear();
    }
}
