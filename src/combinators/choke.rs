//! Debouncing

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::stream::{Emitter, Producer, Stream};
use crate::timing::{self, Scheduler, TimerId};

struct Inner<A: 'static> {
    delay: Duration,
    scheduler: Rc<dyn Scheduler>,
    timeout: Cell<Option<TimerId>>,
    latest: RefCell<Option<A>>,
    f: RefCell<Box<dyn FnMut(A)>>,
}

impl<A: 'static> Inner<A> {
    fn fire(&self) {
        self.timeout.set(None);
        let value = self.latest.borrow_mut().take();
        if let Some(value) = value {
            (&mut *self.f.borrow_mut())(value);
        }
    }

    fn clear(&self) -> bool {
        match self.timeout.take() {
            Some(id) => self.scheduler.clear_timeout(id),
            None => false,
        }
    }
}

/// Debounced function: `f` runs with the latest argument once `delay`
/// passes without another call.
pub struct Choke<A: 'static> {
    inner: Rc<Inner<A>>,
}

impl<A: 'static> Clone for Choke<A> {
    fn clone(&self) -> Self {
        Choke {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: 'static> Choke<A> {
    pub fn new<F>(delay: Duration, f: F) -> Self
    where
        F: FnMut(A) + 'static,
    {
        Self::with_scheduler(delay, timing::current(), f)
    }

    pub fn with_scheduler<F>(delay: Duration, scheduler: Rc<dyn Scheduler>, f: F) -> Self
    where
        F: FnMut(A) + 'static,
    {
        Choke {
            inner: Rc::new(Inner {
                delay,
                scheduler,
                timeout: Cell::new(None),
                latest: RefCell::new(None),
                f: RefCell::new(Box::new(f)),
            }),
        }
    }

    /// Record `arg` and restart the delay
    pub fn call(&self, arg: A) {
        *self.inner.latest.borrow_mut() = Some(arg);
        self.inner.clear();
        let weak: Weak<Inner<A>> = Rc::downgrade(&self.inner);
        let id = self.inner.scheduler.set_timeout(
            self.inner.delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.fire();
                }
            }),
        );
        self.inner.timeout.set(Some(id));
    }

    /// Run `f` now if a call is waiting
    pub fn flush(&self) {
        if self.inner.clear() {
            self.inner.fire();
        }
    }

    /// Drop the waiting call, if any. Returns whether one was waiting.
    pub fn cancel(&self) -> bool {
        self.inner.latest.borrow_mut().take();
        self.inner.clear()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.timeout.get().is_some()
    }
}

impl<T: 'static> Stream<T> {
    /// Emit a value only after `delay` passes with no newer value. When this
    /// stream ends, a value still waiting goes out before the result stops.
    pub fn choke(&self, delay: Duration) -> Stream<T> {
        let slot: Rc<RefCell<Option<Emitter<T>>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        let choke = Choke::new(delay, move |value| {
            let emitter = sink.borrow().clone();
            if let Some(emitter) = emitter {
                if let Err(err) = emitter.emit(value) {
                    log::trace!("choke: value dropped: {}", err);
                }
            }
        });
        let on_stop = choke.clone();
        let output = Stream::new(move |emitter| {
            *slot.borrow_mut() = Some(emitter);
            Producer::new().on_stop(move || {
                on_stop.cancel();
            })
        });
        output.prime();

        let input = choke.clone();
        let closer = output.downgrade();
        self.subscribe(
            move |value| input.call(value),
            move || {
                choke.flush();
                if let Some(output) = closer.upgrade() {
                    let _ = output.stop();
                }
            },
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ManualScheduler;

    #[test]
    fn only_quiet_period_fires() {
        let scheduler = Rc::new(ManualScheduler::new());
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sink = fired.clone();
        let choke = Choke::with_scheduler(Duration::from_millis(50), scheduler.clone(), move |x: i32| {
            sink.borrow_mut().push(x)
        });
        choke.call(1);
        scheduler.advance(Duration::from_millis(30));
        choke.call(2);
        scheduler.advance(Duration::from_millis(30));
        assert!(fired.borrow().is_empty());
        scheduler.advance(Duration::from_millis(20));
        assert_eq!(*fired.borrow(), vec![2]);
        assert!(!choke.is_pending());
    }

    #[test]
    fn cancel_discards_waiting_call() {
        let scheduler = Rc::new(ManualScheduler::new());
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let choke = Choke::with_scheduler(Duration::from_millis(10), scheduler.clone(), move |_: ()| flag.set(true));
        choke.call(());
        assert!(choke.cancel());
        assert!(!choke.cancel());
        scheduler.advance(Duration::from_millis(100));
        assert!(!fired.get());
    }
}
