use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};

//
// ─── WALL CLOCK ────────────────────────────────────────────────────────────────
//

/// Wall-clock abstraction used to timestamp persisted state.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Converts a millisecond count from page configuration into a `Duration`.
///
/// Negative, NaN and infinite inputs collapse to zero; overly large values saturate.
#[must_use]
pub fn duration_from_millis(millis: f64) -> Duration {
    if !millis.is_finite() || millis <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
}

//
// ─── SCHEDULING ────────────────────────────────────────────────────────────────
//

/// Handle to a scheduled task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

pub type OnceTask = Box<dyn FnOnce()>;
pub type RepeatingTask = Box<dyn FnMut()>;

/// Deferred execution on a single-threaded event loop.
///
/// Tasks never run synchronously inside `schedule*`; they always run from the
/// host loop after the delay elapses.
pub trait Scheduler {
    fn schedule(&self, delay: Duration, task: OnceTask) -> TimerHandle;

    /// Runs `task` every `interval`, first after one full interval.
    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TimerHandle;

    /// Cancelling an unknown or already-finished handle is a no-op.
    fn cancel(&self, handle: TimerHandle);
}

/// Shortest period accepted for repeating tasks.
pub const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);

enum Job {
    Once(OnceTask),
    Repeating {
        interval: Duration,
        task: RepeatingTask,
    },
}

#[derive(Default)]
struct QueueState {
    now: Duration,
    next_id: u64,
    next_seq: u64,
    live: HashSet<u64>,
    jobs: BTreeMap<(Duration, u64), (u64, Job)>,
}

impl QueueState {
    fn push(&mut self, due: Duration, id: u64, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.jobs.insert((due, seq), (id, job));
    }

    fn pop_due(&mut self, target: Duration) -> Option<(Duration, u64, Job)> {
        let key = self.jobs.keys().next().copied()?;
        if key.0 > target {
            return None;
        }
        let (_, (id, job)) = self.jobs.remove_entry(&key)?;
        Some((key.0, id, job))
    }
}

/// Simulated clock with a deterministic timer queue.
///
/// Time only moves when the host calls [`TimerQueue::advance`]. Tasks due at the
/// same instant run in scheduling order. Cloning shares the same queue.
#[derive(Clone, Default)]
pub struct TimerQueue {
    state: Rc<RefCell<QueueState>>,
}

impl TimerQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since the queue was created.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of scheduled tasks that have not fired or been cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().live.len()
    }

    #[must_use]
    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.state.borrow().live.contains(&handle.value())
    }

    /// Move virtual time forward, running every task that falls due.
    ///
    /// Returns the number of task invocations.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        let mut ran = 0;

        loop {
            let next = self.state.borrow_mut().pop_due(target);
            let Some((due, id, job)) = next else {
                break;
            };

            let live = {
                let mut state = self.state.borrow_mut();
                state.now = due;
                state.live.contains(&id)
            };
            if !live {
                continue;
            }

            match job {
                Job::Once(task) => {
                    self.state.borrow_mut().live.remove(&id);
                    task();
                }
                Job::Repeating { interval, mut task } => {
                    task();
                    let mut state = self.state.borrow_mut();
                    if state.live.contains(&id) {
                        state.push(due.saturating_add(interval), id, Job::Repeating { interval, task });
                    }
                }
            }
            ran += 1;
        }

        let mut state = self.state.borrow_mut();
        if state.now < target {
            state.now = target;
        }
        ran
    }

    pub fn advance_ms(&self, millis: u64) -> usize {
        self.advance(Duration::from_millis(millis))
    }

    fn register(&self, delay: Duration, job: Job) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now.saturating_add(delay);
        state.live.insert(id);
        state.push(due, id, job);
        TimerHandle::new(id)
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        self.register(delay, Job::Once(task))
    }

    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TimerHandle {
        let interval = interval.max(MIN_REPEAT_INTERVAL);
        self.register(interval, Job::Repeating { interval, task })
    }

    fn cancel(&self, handle: TimerHandle) {
        self.state.borrow_mut().live.remove(&handle.value());
    }
}
