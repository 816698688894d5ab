//! Deterministic scheduler with a virtual clock

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

use super::{Scheduler, Task, TimerId};
use crate::stream_configuration::TimingConfig;

/// A scheduler whose clock only moves when [`advance`](Self::advance) is
/// called. Ticks and spawned futures run on [`run_until_idle`](Self::run_until_idle)
/// (which `advance` also calls between timers).
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    timers: RefCell<BTreeMap<(Duration, TimerId), Task>>,
    deadlines: RefCell<HashMap<TimerId, Duration>>,
    ticks: RefCell<VecDeque<Task>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    config: TimingConfig,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::with_config(TimingConfig::default())
    }

    pub fn with_config(config: TimingConfig) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        ManualScheduler {
            now: Cell::new(Duration::ZERO),
            next_id: Cell::new(0),
            timers: RefCell::new(BTreeMap::new()),
            deadlines: RefCell::new(HashMap::new()),
            ticks: RefCell::new(VecDeque::new()),
            pool: RefCell::new(pool),
            spawner,
            config,
        }
    }

    /// Run queued ticks and spawned futures until neither makes progress
    pub fn run_until_idle(&self) {
        loop {
            let mut progressed = self.run_ticks() > 0;
            while self.pool.borrow_mut().try_run_one() {
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Move the clock forward by `by`, firing every timer that falls due in
    /// deadline order. Each timer sees `now()` equal to its own deadline.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        loop {
            self.run_until_idle();
            let Some(task) = self.pop_due(target) else {
                break;
            };
            task();
        }
        self.now.set(target);
        self.run_until_idle();
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn pending_ticks(&self) -> usize {
        self.ticks.borrow().len()
    }

    fn run_ticks(&self) -> usize {
        let mut ran = 0;
        while ran < self.config.tick_batch {
            let task = self.ticks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    fn pop_due(&self, target: Duration) -> Option<Task> {
        let mut timers = self.timers.borrow_mut();
        let (&(deadline, id), _) = timers.iter().next()?;
        if deadline > target {
            return None;
        }
        let task = timers.remove(&(deadline, id))?;
        self.deadlines.borrow_mut().remove(&id);
        self.now.set(deadline);
        log::trace!("{} fired at {:?}", id, deadline);
        Some(task)
    }

    fn next_id(&self) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        TimerId(id)
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId {
        let id = self.next_id();
        let deadline = self.now.get() + delay;
        self.timers.borrow_mut().insert((deadline, id), task);
        self.deadlines.borrow_mut().insert(id, deadline);
        id
    }

    fn clear_timeout(&self, id: TimerId) -> bool {
        let deadline = self.deadlines.borrow_mut().remove(&id);
        match deadline {
            Some(deadline) => self.timers.borrow_mut().remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    fn request_tick(&self, task: Task) {
        self.ticks.borrow_mut().push_back(task);
    }

    fn frame(&self) -> Duration {
        self.config.frame
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.spawner.spawn_local(future) {
            log::error!("manual scheduler could not spawn future: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn timers_fire_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, label) in [(30, "c"), (10, "a"), (20, "b")] {
            let log = log.clone();
            scheduler.set_timeout(
                Duration::from_millis(delay),
                Box::new(move || log.borrow_mut().push(label)),
            );
        }
        scheduler.advance(Duration::from_millis(25));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(scheduler.now(), Duration::from_millis(25));
        scheduler.advance(Duration::from_millis(5));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn timer_scheduled_by_timer_fires_within_same_advance() {
        let scheduler = Rc::new(ManualScheduler::new());
        let fired_at = Rc::new(Cell::new(None));
        let inner = scheduler.clone();
        let slot = fired_at.clone();
        scheduler.set_timeout(
            Duration::from_millis(10),
            Box::new(move || {
                let clock = inner.clone();
                inner.set_timeout(
                    Duration::from_millis(10),
                    Box::new(move || slot.set(Some(clock.now()))),
                );
            }),
        );
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(fired_at.get(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn spawned_future_runs_when_idle() {
        let scheduler = ManualScheduler::new();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        scheduler.spawn(Box::pin(async move { flag.set(true) }));
        assert!(!done.get());
        scheduler.run_until_idle();
        assert!(done.get());
    }
}
