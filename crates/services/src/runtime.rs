//! [`Scheduler`] backed by tokio timers on a single-threaded `LocalSet`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use reveal_core::time::{MIN_REPEAT_INTERVAL, OnceTask, RepeatingTask};
use reveal_core::{Scheduler, TimerHandle};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

type Tasks = Rc<RefCell<HashMap<u64, JoinHandle<()>>>>;

/// Runs tasks with `tokio::task::spawn_local`.
///
/// Every method must be called from inside a `LocalSet`. Dropping the scheduler
/// aborts whatever is still pending.
#[derive(Default)]
pub struct TokioScheduler {
    next_id: Cell<u64>,
    tasks: Tasks,
}

impl TokioScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks spawned and not yet finished or cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        let id = self.next_id();
        let tasks = Rc::clone(&self.tasks);
        let join = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            tasks.borrow_mut().remove(&id);
            task();
        });
        self.tasks.borrow_mut().insert(id, join);
        TimerHandle::new(id)
    }

    fn schedule_repeating(&self, interval: Duration, mut task: RepeatingTask) -> TimerHandle {
        let id = self.next_id();
        let period = interval.max(MIN_REPEAT_INTERVAL);
        let join = tokio::task::spawn_local(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                task();
            }
        });
        self.tasks.borrow_mut().insert(id, join);
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let removed = self.tasks.borrow_mut().remove(&handle.value());
        if let Some(join) = removed {
            join.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, join) in self.tasks.borrow_mut().drain() {
            join.abort();
        }
    }
}
