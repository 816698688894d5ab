//! Coalescing timer
//!
//! A [`Timer`] batches every request made before it next fires into a single
//! scheduler timeout, then calls each request with the time it fired at.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use super::{Scheduler, TimerId};

/// Handle to a pending [`Timer::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

#[derive(Debug, Clone, Copy)]
enum Cadence {
    Interval(Duration),
    Frame,
}

type Callback = Box<dyn FnOnce(Duration)>;

struct TimerInner {
    cadence: Cadence,
    scheduler: Rc<dyn Scheduler>,
    queue: RefCell<Vec<(RequestId, Callback)>>,
    pending: Cell<Option<TimerId>>,
    next_id: Cell<u64>,
}

#[derive(Clone)]
pub struct Timer {
    inner: Rc<TimerInner>,
}

impl Timer {
    /// Timer firing `duration` after the first outstanding request, on the
    /// thread's current scheduler
    pub fn new(duration: Duration) -> Self {
        Self::with_scheduler(duration, super::current())
    }

    pub fn with_scheduler(duration: Duration, scheduler: Rc<dyn Scheduler>) -> Self {
        Self::build(Cadence::Interval(duration), scheduler)
    }

    /// Timer firing on the scheduler's next frame
    pub fn frame() -> Self {
        Self::frame_with(super::current())
    }

    pub fn frame_with(scheduler: Rc<dyn Scheduler>) -> Self {
        Self::build(Cadence::Frame, scheduler)
    }

    fn build(cadence: Cadence, scheduler: Rc<dyn Scheduler>) -> Self {
        Timer {
            inner: Rc::new(TimerInner {
                cadence,
                scheduler,
                queue: RefCell::new(Vec::new()),
                pending: Cell::new(None),
                next_id: Cell::new(0),
            }),
        }
    }

    pub fn duration(&self) -> Duration {
        match self.inner.cadence {
            Cadence::Interval(duration) => duration,
            Cadence::Frame => self.inner.scheduler.frame(),
        }
    }

    pub fn now(&self) -> Duration {
        self.inner.scheduler.now()
    }

    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::clone(&self.inner.scheduler)
    }

    /// Call `f` with the firing time when this timer next fires
    pub fn request<F>(&self, f: F) -> RequestId
    where
        F: FnOnce(Duration) + 'static,
    {
        let id = RequestId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.queue.borrow_mut().push((id, Box::new(f)));
        if self.inner.pending.get().is_none() {
            self.arm();
        }
        id
    }

    /// Withdraw a request. Returns false when it already ran.
    pub fn cancel(&self, id: RequestId) -> bool {
        let removed = {
            let mut queue = self.inner.queue.borrow_mut();
            let before = queue.len();
            queue.retain(|(request, _)| *request != id);
            before != queue.len()
        };
        if removed && self.inner.queue.borrow().is_empty() {
            if let Some(timeout) = self.inner.pending.take() {
                self.inner.scheduler.clear_timeout(timeout);
            }
        }
        removed
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.get().is_some()
    }

    fn arm(&self) {
        let weak: Weak<TimerInner> = Rc::downgrade(&self.inner);
        let task = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                TimerInner::fire(&inner);
            }
        });
        let timeout = match self.inner.cadence {
            Cadence::Interval(duration) => self.inner.scheduler.set_timeout(duration, task),
            Cadence::Frame => self.inner.scheduler.request_frame(task),
        };
        self.inner.pending.set(Some(timeout));
    }
}

impl TimerInner {
    fn fire(inner: &Rc<TimerInner>) {
        inner.pending.set(None);
        let now = inner.scheduler.now();
        let due = std::mem::take(&mut *inner.queue.borrow_mut());
        log::trace!("timer fired at {:?} with {} request(s)", now, due.len());
        for (_, callback) in due {
            callback(now);
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("cadence", &self.inner.cadence)
            .field("requests", &self.inner.queue.borrow().len())
            .field("pending", &self.is_pending())
            .finish()
    }
}
