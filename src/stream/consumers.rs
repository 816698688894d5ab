//! Terminal consumers of a [`Stream`]
//!
//! `each`, `last` and `pipe` drain synchronously and re-drain on every
//! notification. `fold`, `reduce`, `to_vec`, `first` and `finished` are
//! futures that resolve once the stream is done (or, for `first`, has
//! produced a value); they only need an executor to poll them, not a
//! scheduler.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use super::notify::ListenerId;
use super::Stream;

/// A drain loop attached to one stream
struct Drain<V, E> {
    on_value: RefCell<V>,
    on_end: Cell<Option<E>>,
    flushing: Cell<bool>,
    again: Cell<bool>,
}

impl<V, E> Drain<V, E> {
    /// Pull everything available. Returns false once the stream is done.
    ///
    /// A handler that panics leaves `flushing` set, so that drain never
    /// delivers again.
    fn flush<T>(&self, stream: &Stream<T>) -> bool
    where
        V: FnMut(T),
        E: FnOnce(),
    {
        if self.flushing.replace(true) {
            self.again.set(true);
            return true;
        }
        loop {
            self.again.set(false);
            while let Some(value) = stream.pull() {
                (&mut *self.on_value.borrow_mut())(value);
            }
            if !self.again.get() {
                break;
            }
        }
        self.flushing.set(false);
        if stream.is_done() {
            if let Some(on_end) = self.on_end.take() {
                on_end();
            }
            return false;
        }
        true
    }
}

impl<T: 'static> Stream<T> {
    /// Drain now, then again on every notification until done. `on_end`
    /// runs once when the stream is done.
    ///
    /// The subscription keeps the stream alive until it is done or the
    /// returned listener is removed with [`off`](Self::off).
    pub(crate) fn subscribe<V, E>(&self, on_value: V, on_end: E) -> Option<ListenerId>
    where
        V: FnMut(T) + 'static,
        E: FnOnce() + 'static,
    {
        let drain = Rc::new(Drain {
            on_value: RefCell::new(on_value),
            on_end: Cell::new(Some(on_end)),
            flushing: Cell::new(false),
            again: Cell::new(false),
        });
        if !drain.flush(self) {
            return None;
        }
        let stream = self.clone();
        self.notifier().on(Rc::new(move || drain.flush(&stream)))
    }

    /// Call `f` with every value, now and as they arrive
    pub fn each<F>(&self, f: F) -> &Self
    where
        F: FnMut(T) + 'static,
    {
        self.subscribe(f, || {});
        self
    }

    /// Call `f` with the last value pulled once the stream is done.
    ///
    /// That is the last value still buffered when the stream was stopped,
    /// which is not necessarily the last value ever pushed: values discarded
    /// by an immediate stop never reach `f`.
    pub fn last<F>(&self, f: F) -> &Self
    where
        F: FnOnce(T) + 'static,
    {
        let latest = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&latest);
        self.subscribe(
            move |value| *slot.borrow_mut() = Some(value),
            move || {
                let value = latest.borrow_mut().take();
                if let Some(value) = value {
                    f(value);
                }
            },
        );
        self
    }

    /// Push every value into `target` and stop it when this stream is done
    pub fn pipe(&self, target: &Stream<T>) -> &Self {
        let sink = target.clone();
        let closer = target.clone();
        self.subscribe(
            move |value| {
                if let Err(err) = sink.push(value) {
                    log::warn!("pipe: value dropped: {}", err);
                }
            },
            move || {
                if let Err(err) = closer.stop() {
                    log::warn!("pipe: could not stop target: {}", err);
                }
            },
        );
        self
    }

    /// Run `f` once the stream is done. `f` always runs on a later
    /// scheduler tick, even when the stream is already done.
    pub fn done<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + 'static,
    {
        self.inner.check_done();
        self.inner.lifecycle.on_done(Box::new(f));
        self
    }

    /// Resolves once the stream is done
    pub fn finished(&self) -> impl Future<Output = ()> {
        let stream = self.clone();
        async move {
            loop {
                let notified = stream.notifier().notified();
                stream.inner.check_done();
                if stream.is_done() {
                    return;
                }
                notified.await;
            }
        }
    }

    /// Fold every value, resolving with the accumulator once done
    pub fn fold<A, F>(&self, seed: A, mut f: F) -> impl Future<Output = A>
    where
        A: 'static,
        F: FnMut(A, T) -> A + 'static,
    {
        let stream = self.clone();
        async move {
            let mut acc = seed;
            loop {
                let notified = stream.notifier().notified();
                while let Some(value) = stream.pull() {
                    acc = f(acc, value);
                }
                if stream.is_done() {
                    return acc;
                }
                notified.await;
            }
        }
    }

    /// Fold seeded with the first value. `None` if the stream ends empty.
    pub fn reduce<F>(&self, mut f: F) -> impl Future<Output = Option<T>>
    where
        F: FnMut(T, T) -> T + 'static,
    {
        self.fold(None, move |acc: Option<T>, value| match acc {
            Some(acc) => Some(f(acc, value)),
            None => Some(value),
        })
    }

    pub fn to_vec(&self) -> impl Future<Output = Vec<T>> {
        self.fold(Vec::new(), |mut values, value| {
            values.push(value);
            values
        })
    }

    /// Resolves with the next value, or `None` if the stream ends first
    pub fn first(&self) -> impl Future<Output = Option<T>> {
        let stream = self.clone();
        async move {
            loop {
                let notified = stream.notifier().notified();
                if let Some(value) = stream.pull() {
                    return Some(value);
                }
                if stream.is_done() {
                    return None;
                }
                notified.await;
            }
        }
    }
}
