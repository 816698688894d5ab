//! Last-write-wins throttling

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::error::StreamResult;
use crate::stream::{Emitter, Producer, Stream};
use crate::timing::{RequestId, Timer};

struct State<T: 'static> {
    timer: Timer,
    pending: RefCell<Option<T>>,
    request: Cell<Option<RequestId>>,
    emitter: RefCell<Option<Emitter<T>>>,
}

impl<T: 'static> State<T> {
    fn offer(state: &Rc<Self>, value: T) {
        let replaced = state.pending.borrow_mut().replace(value);
        if replaced.is_some() {
            log::trace!("throttle: pending value overwritten");
        }
        if state.request.get().is_none() {
            let weak = Rc::downgrade(state);
            let id = state.timer.request(move |_| {
                if let Some(state) = weak.upgrade() {
                    state.request.set(None);
                    state.release();
                }
            });
            state.request.set(Some(id));
        }
    }

    fn release(&self) {
        let value = self.pending.borrow_mut().take();
        let emitter = self.emitter.borrow().clone();
        if let (Some(value), Some(emitter)) = (value, emitter) {
            if let Err(err) = emitter.emit(value) {
                log::trace!("throttle: value dropped: {}", err);
            }
        }
    }

    fn cancel(&self) {
        if let Some(id) = self.request.take() {
            self.timer.cancel(id);
        }
    }
}

/// A stream that emits at most one value per timer firing.
///
/// Pushing schedules a single emission on the timer; further pushes before
/// it fires only replace the value waiting to go out.
pub struct Throttle<T: 'static> {
    stream: Stream<T>,
    state: Rc<State<T>>,
}

impl<T: 'static> Clone for Throttle<T> {
    fn clone(&self) -> Self {
        Throttle {
            stream: self.stream.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: 'static> Throttle<T> {
    pub fn new(timer: Timer) -> Self {
        let state = Rc::new(State {
            timer,
            pending: RefCell::new(None),
            request: Cell::new(None),
            emitter: RefCell::new(None),
        });
        let hooks = Rc::clone(&state);
        let stream = Stream::new(move |emitter| {
            *hooks.emitter.borrow_mut() = Some(emitter);
            let input = Rc::clone(&hooks);
            Producer::new()
                .on_push(move |value| State::offer(&input, value))
                .on_stop(move || {
                    hooks.cancel();
                    hooks.pending.borrow_mut().take();
                })
        });
        stream.prime();
        Throttle { stream, state }
    }

    /// Throttle on a timer of the current scheduler
    pub fn every(duration: Duration) -> Self {
        Self::new(Timer::new(duration))
    }

    pub fn push(&self, value: T) -> StreamResult<()> {
        self.stream.push(value)
    }

    /// Stop the stream. With `call_last` the value still waiting for the
    /// timer goes out first; otherwise it is discarded.
    pub fn stop(&self, call_last: bool) -> StreamResult<()> {
        self.state.cancel();
        if call_last {
            self.state.release();
        }
        self.stream.stop()
    }

    pub fn has_pending(&self) -> bool {
        self.state.pending.borrow().is_some()
    }

    pub fn stream(&self) -> &Stream<T> {
        &self.stream
    }

    pub fn into_stream(self) -> Stream<T> {
        self.stream
    }
}

impl<T: 'static> Stream<T> {
    /// Throttle this stream's values on `timer`. The last pending value is
    /// still delivered when this stream ends.
    pub fn throttle(&self, timer: Timer) -> Stream<T> {
        let throttle = Throttle::new(timer);
        let input = throttle.clone();
        let closer = throttle.clone();
        self.subscribe(
            move |value| {
                if let Err(err) = input.push(value) {
                    log::trace!("throttle: value dropped: {}", err);
                }
            },
            move || {
                if let Err(err) = closer.stop(true) {
                    log::warn!("throttle: could not stop: {}", err);
                }
            },
        );
        throttle.into_stream()
    }
}
