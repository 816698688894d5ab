//! Stream constructors over values, functors, futures and timers

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use super::{Emitter, Producer, Stream};
use crate::functor::Functor;
use crate::timing::{self, RequestId, Timer};

impl<T: 'static> Stream<T> {
    /// Pushable stream with `values` already buffered
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::with_buffer(values, |_| Producer::new().pushable())
    }

    /// Empty pushable stream
    pub fn pushable() -> Self {
        Self::of(Vec::new())
    }

    /// Serve pulls straight from `functor`, stopping when it is done
    pub fn from_functor(functor: Functor<T>) -> Self {
        Self::new(move |emitter| {
            let mut functor = functor;
            Producer::new()
                .with_pull(move || {
                    let value = functor.pull();
                    if functor.status().is_done() {
                        let _ = emitter.stop();
                    }
                    value
                })
                .on_stop(|| {})
        })
    }

    /// Emit the output of `future`, then stop.
    ///
    /// The future is spawned on the current scheduler when the stream is
    /// first accessed. Stopping the stream first drops the output when it
    /// arrives; the future itself still runs to completion.
    pub fn from_future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = T> + 'static,
    {
        Self::new(move |emitter| {
            let cancelled = Rc::new(Cell::new(false));
            let flag = Rc::clone(&cancelled);
            timing::current().spawn(Box::pin(async move {
                let value = future.await;
                if flag.get() {
                    log::debug!("future resolved after its stream stopped; output dropped");
                    return;
                }
                if emitter.emit(value).is_ok() {
                    let _ = emitter.stop();
                }
            }));
            Producer::new().on_stop(move || cancelled.set(true))
        })
    }
}

impl Stream<Duration> {
    /// Emit the scheduler time every time `timer` fires, until stopped
    pub fn interval(timer: Timer) -> Self {
        Self::new(move |emitter| {
            let request = Rc::new(Cell::new(None));
            schedule_tick(&timer, emitter, Rc::clone(&request));
            Producer::new().on_stop(move || {
                if let Some(id) = request.take() {
                    timer.cancel(id);
                }
            })
        })
    }
}

fn schedule_tick(timer: &Timer, emitter: Emitter<Duration>, request: Rc<Cell<Option<RequestId>>>) {
    let next = timer.clone();
    let slot = Rc::clone(&request);
    let id = timer.request(move |now| {
        slot.set(None);
        if emitter.emit(now).is_ok() {
            schedule_tick(&next, emitter, slot);
        }
    });
    request.set(Some(id));
}
