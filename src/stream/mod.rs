//! Push-capable streams
//!
//! A [`Stream`] is a [`Functor`](crate::functor::Functor) with a producer
//! behind it: values can be pushed in, the stream can be started and
//! stopped, and consumers are woken through pull notifications instead of
//! polling. Streams are single-threaded reference-counted handles; cloning
//! the handle shares the stream, while [`Sequence::fork`] splits off an
//! independent reader.

pub mod consumers;
mod lifecycle;
pub mod notify;
pub mod producer;
mod sources;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::error::{StreamError, StreamResult};
use crate::functor::operators::Concat;
use crate::functor::tee::tee;
use crate::functor::{BoxPull, Exhausted, Functor, Pull, Sequence, Status};
use crate::stream_configuration::StreamConfig;

use lifecycle::Lifecycle;
use notify::{Notifier, PullGuard};
use producer::{Control, Root, RootNode};

pub use notify::ListenerId;
pub use producer::{Emitter, Phase, Producer};

pub struct Stream<T: 'static> {
    inner: Rc<Inner<T>>,
}

struct Inner<T: 'static> {
    node: RefCell<BoxPull<T>>,
    notifier: Rc<Notifier>,
    lifecycle: Lifecycle,
    control: Option<Rc<dyn Control>>,
    root: Option<Rc<Root<T>>>,
}

impl<T: 'static> Inner<T> {
    fn check_done(&self) {
        if self.lifecycle.is_finished() {
            return;
        }
        let done = match self.node.try_borrow() {
            Ok(node) => node.status().is_done(),
            Err(_) => false,
        };
        if done {
            log::debug!("stream reached done");
            self.lifecycle.finish();
            self.notifier.close();
        }
    }
}

impl<T: 'static> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Stream {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Stream<T> {
    /// A stream whose producer is built by `setup` on first
    /// pull, push, start or stop
    pub fn new<F>(setup: F) -> Self
    where
        F: FnOnce(Emitter<T>) -> Producer<T> + 'static,
    {
        Self::with_buffer(Vec::new(), setup)
    }

    /// Like [`new`](Self::new), with `values` already buffered
    pub fn with_buffer<I, F>(values: I, setup: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: FnOnce(Emitter<T>) -> Producer<T> + 'static,
    {
        Self::with_config(&StreamConfig::default(), values, setup)
    }

    /// Like [`with_buffer`](Self::with_buffer), sizing the root buffer from
    /// `config.buffer`. `config.timing` is not per stream: build a scheduler
    /// from it with [`StreamConfig::manual_scheduler`] or
    /// [`StreamConfig::tokio_scheduler`].
    pub fn with_config<I, F>(config: &StreamConfig, values: I, setup: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: FnOnce(Emitter<T>) -> Producer<T> + 'static,
    {
        let mut buffer = VecDeque::with_capacity(config.buffer.initial_capacity);
        buffer.extend(values);
        Self::from_root(Root::new(buffer, Box::new(setup)))
    }

    fn from_root(root: Rc<Root<T>>) -> Self {
        let notifier = Rc::clone(root.notifier());
        let control: Rc<dyn Control> = root.clone();
        Self::assemble(
            Box::new(RootNode(Rc::clone(&root))),
            notifier,
            Some(control),
            Some(root),
        )
    }

    fn assemble(
        node: BoxPull<T>,
        notifier: Rc<Notifier>,
        control: Option<Rc<dyn Control>>,
        root: Option<Rc<Root<T>>>,
    ) -> Self {
        let stream = Stream {
            inner: Rc::new(Inner {
                node: RefCell::new(node),
                notifier,
                lifecycle: Lifecycle::new(),
                control,
                root,
            }),
        };
        let watched: Weak<Inner<T>> = Rc::downgrade(&stream.inner);
        stream.inner.notifier.on(Rc::new(move || match watched.upgrade() {
            Some(inner) => {
                inner.check_done();
                !inner.lifecycle.is_finished()
            }
            None => false,
        }));
        stream.inner.check_done();
        stream
    }

    /// Run setup now instead of on first access
    pub(crate) fn prime(&self) {
        if let Some(root) = &self.inner.root {
            root.ensure_setup();
        }
    }

    pub(crate) fn notifier(&self) -> &Rc<Notifier> {
        &self.inner.notifier
    }

    /// Next value, or `None` when nothing is ready.
    ///
    /// Pulling a stream from inside its own pull (a producer pulling its own
    /// stream, say) is refused with a warning and yields `None`.
    pub fn pull(&self) -> Option<T> {
        let _guard = PullGuard::enter();
        let value = match self.inner.node.try_borrow_mut() {
            Ok(mut node) => node.pull(),
            Err(_) => {
                log::warn!("re-entrant pull on a stream refused");
                return None;
            }
        };
        self.inner.check_done();
        value
    }

    pub fn status(&self) -> Status {
        if self.inner.lifecycle.is_finished() {
            return Status::Done;
        }
        match self.inner.node.try_borrow() {
            Ok(node) => node.status(),
            Err(_) => Status::Active,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    /// State of the producer behind this stream
    pub fn phase(&self) -> Phase {
        if self.is_done() {
            return Phase::Done;
        }
        match &self.inner.control {
            Some(control) => control.phase(),
            None => Phase::Active,
        }
    }

    /// Push a value through the producer.
    ///
    /// Fails with [`StreamError::Closed`] once the stream is stopping or done
    /// and with [`StreamError::Unpushable`] when the producer takes no input.
    pub fn push(&self, value: T) -> StreamResult<()> {
        if self.is_done() {
            return Err(StreamError::Closed);
        }
        match &self.inner.root {
            Some(root) => root.push(value),
            None => Err(StreamError::Unpushable),
        }
    }

    pub fn push_all<I>(&self, values: I) -> StreamResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        values.into_iter().try_for_each(|value| self.push(value))
    }

    pub fn start(&self) -> StreamResult<()> {
        match &self.inner.control {
            Some(control) => control.start(),
            None => Err(StreamError::Unstartable),
        }
    }

    /// Stop once the values buffered right now have been pulled.
    /// A no-op on a stream that is already done.
    pub fn stop(&self) -> StreamResult<()> {
        self.stop_with(None)
    }

    /// Stop after `count` more pulls; `0` stops immediately and discards
    /// anything buffered
    pub fn stop_after(&self, count: usize) -> StreamResult<()> {
        self.stop_with(Some(count))
    }

    fn stop_with(&self, count: Option<usize>) -> StreamResult<()> {
        if self.is_done() {
            return Ok(());
        }
        match &self.inner.control {
            Some(control) => control.stop(count),
            None => Err(StreamError::Unstoppable),
        }
    }

    /// Call `f` whenever something may be ready to pull. Returns `None` if
    /// the stream is already done.
    pub fn on_notify<F>(&self, f: F) -> Option<ListenerId>
    where
        F: Fn() + 'static,
    {
        self.inner.notifier.on(Rc::new(move || {
            f();
            true
        }))
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.notifier.off(id)
    }

    pub fn downgrade(&self) -> WeakStream<T> {
        WeakStream {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Stream`]
pub struct WeakStream<T: 'static> {
    inner: Weak<Inner<T>>,
}

impl<T: 'static> WeakStream<T> {
    pub fn upgrade(&self) -> Option<Stream<T>> {
        self.inner.upgrade().map(|inner| Stream { inner })
    }
}

impl<T: 'static> Clone for WeakStream<T> {
    fn clone(&self) -> Self {
        WeakStream {
            inner: self.inner.clone(),
        }
    }
}

/// A stream seen as the parent node of an operator
struct Upstream<T: 'static>(Stream<T>);

impl<T: 'static> Pull for Upstream<T> {
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        self.0.pull()
    }

    fn status(&self) -> Status {
        self.0.status()
    }
}

impl<T: 'static> Sequence for Stream<T> {
    type Item = T;
    type Derived<U: 'static> = Stream<U>;

    fn pull(&mut self) -> Option<T> {
        Stream::pull(self)
    }

    fn status(&self) -> Status {
        Stream::status(self)
    }

    fn into_pull(self) -> BoxPull<T> {
        Box::new(Upstream(self))
    }

    /// The derived stream is notified whenever this one is and shares its
    /// start/stop control
    fn derive<U, F>(self, build: F) -> Stream<U>
    where
        U: 'static,
        F: FnOnce(BoxPull<T>) -> BoxPull<U>,
    {
        let notifier = Notifier::child_of(&self.inner.notifier);
        let control = self.inner.control.clone();
        let node = build(self.into_pull());
        Stream::assemble(node, notifier, control, None)
    }

    fn concat<I>(self, rest: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let notifier = Notifier::new();
        let control = self.inner.control.clone();
        let mut parts: VecDeque<BoxPull<T>> = VecDeque::new();
        for part in std::iter::once(self).chain(rest) {
            notifier.follow(&part.inner.notifier);
            parts.push_back(part.into_pull());
        }
        Stream::assemble(Box::new(Concat::new(parts)), notifier, control, None)
    }

    /// The fork shares this stream's producer: pushing into either side
    /// feeds both
    fn fork(&mut self) -> Self
    where
        T: Clone,
    {
        let source = self.inner.node.replace(Box::new(Exhausted::new()));
        let (left, right) = tee(source);
        *self.inner.node.borrow_mut() = Box::new(left);
        let notifier = Notifier::child_of(&self.inner.notifier);
        Stream::assemble(
            Box::new(right),
            notifier,
            self.inner.control.clone(),
            self.inner.root.clone(),
        )
    }
}

impl<T: 'static> futures_core::Stream for Stream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        loop {
            let seen = self.inner.notifier.epoch();
            if let Some(value) = self.pull() {
                return Poll::Ready(Some(value));
            }
            if self.is_done() {
                return Poll::Ready(None);
            }
            self.inner.notifier.register_waker(cx.waker());
            if self.inner.notifier.epoch() == seen {
                return Poll::Pending;
            }
        }
    }
}

impl<T: 'static> From<Functor<T>> for Stream<T> {
    fn from(functor: Functor<T>) -> Self {
        Stream::from_functor(functor)
    }
}

impl<T: 'static> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("status", &self.status())
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functor::SequenceExt;

    #[test]
    fn derived_stream_finishes_with_its_root() {
        let root = Stream::of(vec![1, 2]);
        let doubled = root.clone().map(|x| x * 2);
        assert_eq!(doubled.pull(), Some(2));
        root.stop().unwrap();
        assert_eq!(doubled.status(), Status::Active);
        assert_eq!(doubled.pull(), Some(4));
        assert_eq!(doubled.status(), Status::Done);
        assert_eq!(doubled.pull(), None);
    }

    #[test]
    fn stop_on_derived_stream_stops_root() {
        let root: Stream<i32> = Stream::pushable();
        let evens = root.clone().filter(|x| x % 2 == 0);
        evens.stop().unwrap();
        assert_eq!(root.phase(), Phase::Done);
        assert!(evens.is_done());
        assert_eq!(root.push(2), Err(StreamError::Closed));
    }

    #[test]
    fn derived_stream_is_not_pushable() {
        let root: Stream<i32> = Stream::pushable();
        let mapped = root.map(|x| x + 1);
        assert_eq!(mapped.push(1), Err(StreamError::Unpushable));
    }

    #[test]
    fn fork_shares_the_producer() {
        let mut stream: Stream<i32> = Stream::pushable();
        let other = stream.fork();
        other.push(5).unwrap();
        assert_eq!(stream.pull(), Some(5));
        assert_eq!(other.pull(), Some(5));
    }

    #[test]
    fn take_finishes_before_the_root() {
        let root = Stream::of(vec![1, 2, 3]);
        let first = root.clone().take(1);
        assert_eq!(first.pull(), Some(1));
        assert!(first.is_done());
        assert_eq!(root.phase(), Phase::Active);
        assert_eq!(first.push(9), Err(StreamError::Closed));
    }
}
