//! Tagged Task Scheduler
//!
//! The scheduler owns a set of timed tasks, each carrying a free-text tag for
//! diagnostics and an [`EventOutput`] to fire.
//!
//! # Task Kinds
//!
//! - **Once**: fires at its deadline, then completes.
//! - **Periodic**: the next deadline is measured from when the firing
//!   *finished*, so a slow firing pushes every later firing back.
//! - **Fixed-rate**: the next deadline is the previous *deadline* plus the
//!   period, so a slow firing is followed by back-to-back catch-up firings
//!   and the task keeps its original grid. At most
//!   [`SchedulerConfig::max_catch_up`] overdue firings are replayed; older
//!   ones are dropped with a warning.
//!
//! # Passes
//!
//! [`Scheduler::run_pending`] runs one pass: it reads the clock once and
//! fires every task whose deadline had passed at that instant, in deadline
//! order. Firings that become due while the pass runs (including catch-up
//! firings) wait for the next pass. Passes are driven either by hand (tests
//! with a [`VirtualClock`](super::VirtualClock)) or by the tokio driver in
//! [`super::driver`].
//!
//! # Thread Safety
//!
//! Tasks may be scheduled and cancelled from any thread, including from
//! inside a firing task. No lock is held while a task fires.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::clock::SharedClock;
use crate::channel::{Cancel, EventOutput};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::logging;

/// Unique identifier for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// How a task is rescheduled after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Once,
    Periodic,
    FixedRate,
}

struct Task {
    tag: String,
    kind: TaskKind,
    period: u64,
    target: EventOutput,
}

/// A queue entry. Ordered by deadline, then by insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Queued {
    deadline: u64,
    seq: u64,
    id: TaskId,
}

pub(super) struct Inner {
    clock: SharedClock,
    config: SchedulerConfig,
    /// Live tasks. A queue entry whose task is gone is stale and skipped.
    tasks: DashMap<TaskId, Arc<Task>>,
    queue: Mutex<BinaryHeap<Reverse<Queued>>>,
    next_seq: AtomicU64,
    /// Wakes the real-time driver when the queue changes.
    pub(super) wake: Notify,
}

impl Inner {
    fn push(&self, deadline: u64, id: TaskId) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().push(Reverse(Queued { deadline, seq, id }));
        self.wake.notify_one();
    }
}

/// Explicitly constructed task scheduler. Clones share the same task set.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) inner: Arc<Inner>,
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn check_period(period: Duration) -> Result<u64> {
    match nanos(period) {
        0 => Err(Error::invalid_argument("task period must be positive")),
        period => Ok(period),
    }
}

impl Scheduler {
    /// A scheduler with default configuration.
    pub fn new(clock: SharedClock) -> Self {
        Self::build(clock, SchedulerConfig::default())
    }

    /// A scheduler with explicit configuration.
    pub fn with_config(clock: SharedClock, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(clock, config))
    }

    fn build(clock: SharedClock, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                config,
                tasks: DashMap::new(),
                queue: Mutex::new(BinaryHeap::new()),
                next_seq: AtomicU64::new(0),
                wake: Notify::new(),
            }),
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.inner.clock
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn now_nanos(&self) -> u64 {
        self.inner.clock.now_nanos()
    }

    /// Fire `target` once at the absolute clock reading `deadline`.
    pub fn schedule_at(&self, tag: &str, deadline: u64, target: EventOutput) -> Cancel {
        self.add(tag, TaskKind::Once, 0, deadline, target)
    }

    /// Fire `target` once, `delay` from now.
    pub fn schedule_after(&self, tag: &str, delay: Duration, target: EventOutput) -> Cancel {
        let deadline = self.now_nanos().saturating_add(nanos(delay));
        self.schedule_at(tag, deadline, target)
    }

    /// Fire `target` every `period`, measured from the end of each firing.
    pub fn schedule_periodic(
        &self,
        tag: &str,
        period: Duration,
        target: EventOutput,
    ) -> Result<Cancel> {
        self.repeating(tag, TaskKind::Periodic, period, target)
    }

    /// Fire `target` every `period` on a fixed grid, catching up after
    /// overruns.
    pub fn schedule_fixed_rate(
        &self,
        tag: &str,
        period: Duration,
        target: EventOutput,
    ) -> Result<Cancel> {
        self.repeating(tag, TaskKind::FixedRate, period, target)
    }

    fn repeating(
        &self,
        tag: &str,
        kind: TaskKind,
        period: Duration,
        target: EventOutput,
    ) -> Result<Cancel> {
        let period = check_period(period)?;
        let first = self.now_nanos().saturating_add(period);
        Ok(self.add(tag, kind, period, first, target))
    }

    fn add(&self, tag: &str, kind: TaskKind, period: u64, deadline: u64, target: EventOutput) -> Cancel {
        let id = TaskId::new();
        self.inner.tasks.insert(
            id,
            Arc::new(Task {
                tag: tag.to_owned(),
                kind,
                period,
                target,
            }),
        );
        self.inner.push(deadline, id);

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Cancel::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.tasks.remove(&id);
            }
        })
    }

    /// Run one pass. Returns the number of tasks fired.
    pub fn run_pending(&self) -> usize {
        let now = self.now_nanos();
        let due: Vec<Queued> = {
            let mut queue = self.inner.queue.lock();
            let mut due = Vec::new();
            while let Some(Reverse(entry)) = queue.peek() {
                if entry.deadline > now {
                    break;
                }
                due.push(*entry);
                queue.pop();
            }
            due
        };

        let mut fired = 0;
        for entry in due {
            let task = match self.inner.tasks.get(&entry.id) {
                Some(task) => Arc::clone(task.value()),
                None => continue,
            };
            if task.kind == TaskKind::Once {
                self.inner.tasks.remove(&entry.id);
            }

            fired += 1;
            if let Err(err) = task.target.event() {
                logging::task_failure(&task.tag, &err);
            }

            let next = match task.kind {
                TaskKind::Once => continue,
                TaskKind::Periodic => self.now_nanos().saturating_add(task.period),
                TaskKind::FixedRate => self.next_on_grid(&task, entry.deadline),
            };
            if self.inner.tasks.contains_key(&entry.id) {
                self.inner.push(next, entry.id);
            }
        }
        fired
    }

    /// The slot after `deadline`, skipping overdue slots beyond the
    /// catch-up bound.
    fn next_on_grid(&self, task: &Task, deadline: u64) -> u64 {
        let mut next = deadline.saturating_add(task.period);
        let now = self.now_nanos();
        if next <= now {
            let behind = (now - next) / task.period + 1;
            let bound = u64::from(self.inner.config.max_catch_up);
            if behind > bound {
                let dropped = behind - bound;
                next = next.saturating_add(dropped.saturating_mul(task.period));
                logging::catch_up_overrun(&task.tag, dropped);
            }
        }
        next
    }

    /// Earliest deadline among live tasks.
    pub fn next_deadline(&self) -> Option<u64> {
        let mut queue = self.inner.queue.lock();
        while let Some(Reverse(entry)) = queue.peek() {
            if self.inner.tasks.contains_key(&entry.id) {
                return Some(entry.deadline);
            }
            queue.pop();
        }
        None
    }

    /// Number of live tasks.
    pub fn task_count(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Tags of every live task, sorted.
    pub fn active_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .inner
            .tasks
            .iter()
            .map(|task| task.value().tag.clone())
            .collect();
        tags.sort();
        tags
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("clock", &self.inner.clock)
            .field("task_count", &self.task_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::VirtualClock;
    use std::sync::atomic::AtomicUsize;

    fn counting(count: &Arc<AtomicUsize>) -> EventOutput {
        let count = count.clone();
        EventOutput::from_fn(move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn setup() -> (VirtualClock, Scheduler) {
        let clock = VirtualClock::new();
        let scheduler = Scheduler::new(clock.shared());
        (clock, scheduler)
    }

    #[test]
    fn once_fires_at_deadline_then_completes() {
        let (clock, scheduler) = setup();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.schedule_after("once", Duration::from_millis(10), counting(&count));

        clock.advance(Duration::from_millis(9));
        assert_eq!(scheduler.run_pending(), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(scheduler.run_pending(), 1);
        clock.advance(Duration::from_millis(100));
        assert_eq!(scheduler.run_pending(), 0);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn due_tasks_fire_in_deadline_order() {
        let (clock, scheduler) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (tag, delay) in [("late", 30), ("early", 10), ("middle", 20)] {
            let order = order.clone();
            scheduler.schedule_after(
                tag,
                Duration::from_millis(delay),
                EventOutput::from_fn(move || {
                    order.lock().push(tag);
                    Ok(())
                }),
            );
        }

        clock.advance(Duration::from_millis(50));
        scheduler.run_pending();
        assert_eq!(*order.lock(), vec!["early", "middle", "late"]);
    }

    #[test]
    fn cancel_prevents_future_firings() {
        let (clock, scheduler) = setup();
        let count = Arc::new(AtomicUsize::new(0));
        let token = scheduler
            .schedule_periodic("tick", Duration::from_millis(10), counting(&count))
            .unwrap();

        clock.advance(Duration::from_millis(10));
        scheduler.run_pending();
        token.cancel();
        token.cancel();
        clock.advance(Duration::from_millis(10));
        scheduler.run_pending();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn zero_period_is_rejected() {
        let (_clock, scheduler) = setup();
        let err = scheduler
            .schedule_fixed_rate("bad", Duration::ZERO, EventOutput::ignored())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn task_may_cancel_itself() {
        let (clock, scheduler) = setup();
        let count = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Cancel>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let count_clone = count.clone();
        let token = scheduler
            .schedule_periodic(
                "self-cancel",
                Duration::from_millis(5),
                EventOutput::from_fn(move || {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                    if let Some(token) = slot_clone.lock().as_ref() {
                        token.cancel();
                    }
                    Ok(())
                }),
            )
            .unwrap();
        *slot.lock() = Some(token);

        for _ in 0..3 {
            clock.advance(Duration::from_millis(5));
            scheduler.run_pending();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_task_keeps_its_schedule() {
        let (clock, scheduler) = setup();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        scheduler
            .schedule_periodic(
                "flaky",
                Duration::from_millis(10),
                EventOutput::from_fn(move || {
                    attempts_clone.fetch_add(1, Ordering::SeqCst);
                    Err(Error::listener("sensor offline"))
                }),
            )
            .unwrap();

        for _ in 0..3 {
            clock.advance(Duration::from_millis(10));
            scheduler.run_pending();
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn catch_up_is_bounded() {
        let clock = VirtualClock::new();
        let config = SchedulerConfig {
            max_catch_up: 2,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::with_config(clock.shared(), config).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .schedule_fixed_rate("grid", Duration::from_millis(10), counting(&count))
            .unwrap();

        // Ten periods late: one firing now, two catch-up firings, the rest
        // dropped. The grid is kept.
        clock.advance(Duration::from_millis(105));
        for _ in 0..10 {
            scheduler.run_pending();
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.next_deadline(), Some(110_000_000));
    }

    #[test]
    fn active_tags_lists_live_tasks() {
        let (_clock, scheduler) = setup();
        let a = scheduler.schedule_after("b-task", Duration::from_secs(1), EventOutput::ignored());
        scheduler.schedule_after("a-task", Duration::from_secs(1), EventOutput::ignored());

        assert_eq!(scheduler.active_tags(), vec!["a-task", "b-task"]);
        a.cancel();
        assert_eq!(scheduler.active_tags(), vec!["a-task"]);
    }
}
