//! Scheduling primitives
//!
//! Streams never block. Anything that waits (timers, frames, resolved
//! futures, done callbacks) is handed to a [`Scheduler`]. Two are provided:
//!
//! - [`TokioScheduler`] runs tasks on the current tokio `LocalSet` in real
//!   (or tokio-paused) time.
//! - [`ManualScheduler`] keeps a virtual clock and only runs tasks when told
//!   to, which makes timing behaviour deterministic in tests.
//!
//! Each thread has a default scheduler, [`current`]. Unless replaced with
//! [`set_default`] it is a [`TokioScheduler`] when a tokio runtime is
//! entered, and otherwise a fallback [`ManualScheduler`] whose queued ticks
//! and futures run when the outermost stream pull returns, or on
//! [`run_pending`]. Its clock never moves on its own, so timers only fire
//! on an explicitly installed scheduler.

pub mod manual;
pub mod timer;
pub mod tokio_scheduler;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;

pub use manual::ManualScheduler;
pub use timer::{RequestId, Timer};
pub use tokio_scheduler::TokioScheduler;

/// A deferred unit of work
pub type Task = Box<dyn FnOnce()>;

/// Handle to a scheduled timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Host event loop abstraction
pub trait Scheduler {
    /// Time elapsed since the scheduler was created
    fn now(&self) -> Duration;

    /// Run `task` once `delay` has elapsed
    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId;

    /// Cancel a timeout. Returns false when it already ran or was cancelled.
    fn clear_timeout(&self, id: TimerId) -> bool;

    /// Run `task` soon, after the current synchronous work completes
    fn request_tick(&self, task: Task);

    /// Cadence of animation frames
    fn frame(&self) -> Duration;

    /// Run `task` at the next frame
    fn request_frame(&self, task: Task) -> TimerId {
        self.set_timeout(self.frame(), task)
    }

    /// Drive a future to completion on this scheduler
    fn spawn(&self, future: LocalBoxFuture<'static, ()>);
}

thread_local! {
    static DEFAULT: RefCell<Option<Rc<dyn Scheduler>>> = const { RefCell::new(None) };
    static TOKIO: RefCell<Option<Rc<TokioScheduler>>> = const { RefCell::new(None) };
    static FALLBACK: RefCell<Option<Rc<ManualScheduler>>> = const { RefCell::new(None) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// The scheduler used by this thread
pub fn current() -> Rc<dyn Scheduler> {
    if let Some(scheduler) = DEFAULT.with(|cell| cell.borrow().clone()) {
        return scheduler;
    }
    if tokio::runtime::Handle::try_current().is_ok() {
        let scheduler = TOKIO.with(|cell| {
            Rc::clone(cell.borrow_mut().get_or_insert_with(|| Rc::new(TokioScheduler::new())))
        });
        return scheduler;
    }
    fallback()
}

fn fallback() -> Rc<ManualScheduler> {
    FALLBACK.with(|cell| {
        Rc::clone(cell.borrow_mut().get_or_insert_with(|| {
            log::warn!("no tokio runtime on this thread; queuing scheduled work on a manual fallback");
            Rc::new(ManualScheduler::new())
        }))
    })
}

/// Run the ticks and futures queued on this thread's fallback scheduler.
///
/// Does nothing when the fallback was never used, or when called from work
/// the fallback is already running.
pub fn run_pending() {
    let Some(scheduler) = FALLBACK.with(|cell| cell.borrow().clone()) else {
        return;
    };
    if DRAINING.with(|draining| draining.replace(true)) {
        return;
    }
    struct Reset;
    impl Drop for Reset {
        fn drop(&mut self) {
            DRAINING.with(|draining| draining.set(false));
        }
    }
    let _reset = Reset;
    scheduler.run_until_idle();
}

/// Replace this thread's scheduler until the returned guard is dropped
#[must_use = "the previous scheduler is restored when the guard is dropped"]
pub fn set_default(scheduler: Rc<dyn Scheduler>) -> DefaultGuard {
    let previous = DEFAULT.with(|cell| cell.replace(Some(scheduler)));
    DefaultGuard { previous }
}

/// Restores the previous default scheduler on drop
pub struct DefaultGuard {
    previous: Option<Rc<dyn Scheduler>>,
}

impl Drop for DefaultGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        DEFAULT.with(|cell| *cell.borrow_mut() = previous);
    }
}

/// Run `task` on the next tick of the current scheduler
pub fn request_tick<F>(task: F)
where
    F: FnOnce() + 'static,
{
    current().request_tick(Box::new(task));
}

/// Run `task` at the next frame of the current scheduler
pub fn request_frame<F>(task: F) -> TimerId
where
    F: FnOnce() + 'static,
{
    current().request_frame(Box::new(task))
}

pub fn cancel_frame(id: TimerId) -> bool {
    current().clear_timeout(id)
}

/// Time on the current scheduler's clock
pub fn now() -> Duration {
    current().now()
}
