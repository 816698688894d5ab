//! Real-time scheduler on top of tokio's local task set

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::{Scheduler, Task, TimerId};
use crate::stream_configuration::TimingConfig;

/// Scheduler backed by `tokio::task::spawn_local` and `tokio::time::sleep`.
///
/// Every method that schedules work must be called from inside a
/// `tokio::task::LocalSet`; streams are `!Send`, so their tasks cannot go on
/// the multi-threaded pool. Under a paused tokio clock timers advance
/// deterministically.
pub struct TokioScheduler {
    epoch: Instant,
    timers: Rc<RefCell<HashMap<TimerId, AbortHandle>>>,
    next_id: Cell<u64>,
    config: TimingConfig,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::with_config(TimingConfig::default())
    }

    pub fn with_config(config: TimingConfig) -> Self {
        TokioScheduler {
            epoch: Instant::now(),
            timers: Rc::new(RefCell::new(HashMap::new())),
            next_id: Cell::new(0),
            config,
        }
    }

    /// Number of timeouts that have neither fired nor been cleared
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    fn next_id(&self) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        TimerId(id)
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        Instant::now().duration_since(self.epoch)
    }

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId {
        let id = self.next_id();
        let timers = Rc::clone(&self.timers);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            timers.borrow_mut().remove(&id);
            log::trace!("{} fired", id);
            task();
        });
        self.timers.borrow_mut().insert(id, handle.abort_handle());
        id
    }

    fn clear_timeout(&self, id: TimerId) -> bool {
        let handle = self.timers.borrow_mut().remove(&id);
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn request_tick(&self, task: Task) {
        tokio::task::spawn_local(async move {
            task();
        });
    }

    fn frame(&self) -> Duration {
        self.config.frame
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_after_delay() {
        LocalSet::new()
            .run_until(async {
                let scheduler = TokioScheduler::new();
                let fired = Rc::new(Cell::new(false));
                let flag = fired.clone();
                scheduler.set_timeout(Duration::from_millis(50), Box::new(move || flag.set(true)));
                assert_eq!(scheduler.pending_timers(), 1);

                tokio::time::sleep(Duration::from_millis(20)).await;
                assert!(!fired.get());
                tokio::time::sleep(Duration::from_millis(40)).await;
                assert!(fired.get());
                assert_eq!(scheduler.pending_timers(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_timeout_does_not_fire() {
        LocalSet::new()
            .run_until(async {
                let scheduler = TokioScheduler::new();
                let fired = Rc::new(Cell::new(false));
                let flag = fired.clone();
                let id = scheduler.set_timeout(Duration::from_millis(10), Box::new(move || flag.set(true)));
                assert!(scheduler.clear_timeout(id));
                assert!(!scheduler.clear_timeout(id));
                tokio::time::sleep(Duration::from_millis(50)).await;
                assert!(!fired.get());
            })
            .await;
    }
}
