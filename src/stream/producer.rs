//! Producers and the root buffer of a stream
//!
//! A stream's setup function receives an [`Emitter`] and returns a
//! [`Producer`], the record of what the source can do. The root node owns
//! the buffer and the `Pending -> Active -> Stopping(n) -> Done` state
//! machine.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use super::notify::Notifier;
use crate::error::{StreamError, StreamResult};
use crate::functor::{Pull, Status};

/// Root state of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Setup has not run yet
    Pending,
    /// Accepting pushes and pulls
    Active,
    /// Draining: this many more pulls, then done
    Stopping(usize),
    /// Terminal
    Done,
}

type PushHook<T> = Box<dyn FnMut(T)>;
type PullHook<T> = Box<dyn FnMut() -> Option<T>>;

/// Capabilities of a stream source.
///
/// Everything is optional. A producer with no `pushable`/`on_push` rejects
/// `push` with [`StreamError::Unpushable`]; without `on_start`, `start`
/// fails with [`StreamError::Unstartable`]; `stop` needs either a push
/// capability or an `on_stop` hook. With [`with_pull`](Self::with_pull) the
/// producer supplies values itself and the buffer only holds what was
/// emitted explicitly.
pub struct Producer<T> {
    pushable: bool,
    on_push: Option<PushHook<T>>,
    on_start: Option<Box<dyn FnMut()>>,
    on_stop: Option<Box<dyn FnOnce()>>,
    pull: Option<PullHook<T>>,
}

impl<T> Producer<T> {
    pub fn new() -> Self {
        Producer {
            pushable: false,
            on_push: None,
            on_start: None,
            on_stop: None,
            pull: None,
        }
    }

    /// Accept `push`, buffering each value
    pub fn pushable(mut self) -> Self {
        self.pushable = true;
        self
    }

    /// Accept `push`, handing each value to `f` instead of the buffer
    pub fn on_push<F>(mut self, f: F) -> Self
    where
        F: FnMut(T) + 'static,
    {
        self.pushable = true;
        self.on_push = Some(Box::new(f));
        self
    }

    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.on_start = Some(Box::new(f));
        self
    }

    /// Runs once, when the stream starts stopping
    pub fn on_stop<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_stop = Some(Box::new(f));
        self
    }

    /// Serve pulls from `f` once the buffer is empty
    pub fn with_pull<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> Option<T> + 'static,
    {
        self.pull = Some(Box::new(f));
        self
    }
}

impl<T> Default for Producer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("pushable", &self.pushable)
            .field("on_push", &self.on_push.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .field("pull", &self.pull.is_some())
            .finish()
    }
}

pub(crate) type Setup<T> = Box<dyn FnOnce(Emitter<T>) -> Producer<T>>;

#[derive(Default, Clone, Copy)]
struct Caps {
    pushable: bool,
    startable: bool,
    stoppable: bool,
    pulls: bool,
}

/// Start/stop access shared by a root and every stream derived from it
pub(crate) trait Control {
    fn start(&self) -> StreamResult<()>;
    fn stop(&self, count: Option<usize>) -> StreamResult<()>;
    fn phase(&self) -> Phase;
}

pub(crate) struct Root<T: 'static> {
    this: Weak<Root<T>>,
    phase: Cell<Phase>,
    caps: Cell<Caps>,
    buffer: RefCell<VecDeque<T>>,
    setup: RefCell<Option<Setup<T>>>,
    push_hook: RefCell<Option<PushHook<T>>>,
    start_hook: RefCell<Option<Box<dyn FnMut()>>>,
    stop_hook: RefCell<Option<Box<dyn FnOnce()>>>,
    pull_hook: RefCell<Option<PullHook<T>>>,
    notifier: Rc<Notifier>,
}

impl<T: 'static> Root<T> {
    pub(crate) fn new(buffer: VecDeque<T>, setup: Setup<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| Root {
            this: this.clone(),
            phase: Cell::new(Phase::Pending),
            caps: Cell::new(Caps::default()),
            buffer: RefCell::new(buffer),
            setup: RefCell::new(Some(setup)),
            push_hook: RefCell::new(None),
            start_hook: RefCell::new(None),
            stop_hook: RefCell::new(None),
            pull_hook: RefCell::new(None),
            notifier: Notifier::new(),
        })
    }

    pub(crate) fn notifier(&self) -> &Rc<Notifier> {
        &self.notifier
    }

    pub(crate) fn ensure_setup(&self) {
        if self.phase.get() != Phase::Pending {
            return;
        }
        self.phase.set(Phase::Active);
        let setup = self.setup.borrow_mut().take();
        if let Some(setup) = setup {
            log::debug!("running stream setup");
            let producer = setup(Emitter {
                root: self.this.clone(),
            });
            self.install(producer);
        }
    }

    fn install(&self, producer: Producer<T>) {
        self.caps.set(Caps {
            pushable: producer.pushable,
            startable: producer.on_start.is_some(),
            stoppable: producer.pushable || producer.on_stop.is_some(),
            pulls: producer.pull.is_some(),
        });
        if self.phase.get() == Phase::Done {
            // stopped from inside setup
            if let Some(hook) = producer.on_stop {
                hook();
            }
            return;
        }
        *self.push_hook.borrow_mut() = producer.on_push;
        *self.start_hook.borrow_mut() = producer.on_start;
        *self.stop_hook.borrow_mut() = producer.on_stop;
        *self.pull_hook.borrow_mut() = producer.pull;
        if let Phase::Stopping(_) = self.phase.get() {
            self.run_stop_hook();
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub(crate) fn pull(&self) -> Option<T> {
        self.ensure_setup();
        if self.phase.get() == Phase::Done {
            return None;
        }
        let buffered = self.buffer.borrow_mut().pop_front();
        let value = match buffered {
            Some(value) => Some(value),
            None => self.pull_from_hook(),
        };
        if value.is_some() {
            if let Phase::Stopping(remaining) = self.phase.get() {
                if remaining <= 1 {
                    self.finish();
                } else {
                    self.phase.set(Phase::Stopping(remaining - 1));
                }
            }
        }
        value
    }

    fn pull_from_hook(&self) -> Option<T> {
        Lent::take(&self.pull_hook, &self.phase)?
            .call(|hook| hook())
            .flatten()
    }

    pub(crate) fn push(&self, value: T) -> StreamResult<()> {
        self.ensure_setup();
        if self.is_closing() {
            return Err(StreamError::Closed);
        }
        if !self.caps.get().pushable {
            return Err(StreamError::Unpushable);
        }
        match Lent::take(&self.push_hook, &self.phase) {
            Some(lent) => {
                lent.call(|hook| hook(value));
                Ok(())
            }
            None => self.enqueue(value),
        }
    }

    /// Buffer a value and notify, bypassing capability checks
    pub(crate) fn enqueue(&self, value: T) -> StreamResult<()> {
        if self.is_closing() {
            return Err(StreamError::Closed);
        }
        self.buffer.borrow_mut().push_back(value);
        self.notifier.notify();
        Ok(())
    }

    fn is_closing(&self) -> bool {
        matches!(self.phase.get(), Phase::Stopping(_) | Phase::Done)
    }

    /// Begin stopping after `count` more pulls, or after the buffered values
    /// when `count` is `None`. Without a pull hook the countdown never
    /// exceeds what is buffered. An earlier, shorter countdown wins.
    pub(crate) fn schedule_stop(&self, count: Option<usize>) {
        let phase = self.phase.get();
        if phase == Phase::Done {
            return;
        }
        let buffered = self.buffer.borrow().len();
        let mut remaining = count.unwrap_or(buffered);
        if !self.caps.get().pulls {
            remaining = remaining.min(buffered);
        }
        if let Phase::Stopping(current) = phase {
            remaining = remaining.min(current);
        }
        if remaining == 0 {
            self.finish();
            return;
        }
        log::debug!("stream stopping after {} more pull(s)", remaining);
        self.phase.set(Phase::Stopping(remaining));
        self.run_stop_hook();
    }

    fn run_stop_hook(&self) {
        let hook = self.stop_hook.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn finish(&self) {
        if self.phase.replace(Phase::Done) == Phase::Done {
            return;
        }
        let discarded = std::mem::take(&mut *self.buffer.borrow_mut());
        let push_hook = self.push_hook.borrow_mut().take();
        let start_hook = self.start_hook.borrow_mut().take();
        let pull_hook = self.pull_hook.borrow_mut().take();
        self.run_stop_hook();
        log::debug!("stream done, {} buffered value(s) discarded", discarded.len());
        drop((discarded, push_hook, start_hook, pull_hook));
        self.notifier.close();
    }
}

impl<T: 'static> Control for Root<T> {
    fn start(&self) -> StreamResult<()> {
        self.ensure_setup();
        if self.is_closing() {
            return Err(StreamError::Closed);
        }
        if !self.caps.get().startable {
            return Err(StreamError::Unstartable);
        }
        if let Some(lent) = Lent::take(&self.start_hook, &self.phase) {
            lent.call(|hook| hook());
        }
        Ok(())
    }

    fn stop(&self, count: Option<usize>) -> StreamResult<()> {
        self.ensure_setup();
        if self.phase.get() == Phase::Done {
            return Ok(());
        }
        if !self.caps.get().stoppable {
            return Err(StreamError::Unstoppable);
        }
        self.schedule_stop(count);
        Ok(())
    }

    fn phase(&self) -> Phase {
        self.phase.get()
    }
}

/// A hook taken out of its slot for the duration of one call.
///
/// Hooks are called without a borrow on their slot so they can re-enter the
/// stream. Dropping the guard puts the hook back unless the stream finished
/// meanwhile or the hook installed a replacement, and that includes
/// unwinding out of a panicking hook.
struct Lent<'a, H> {
    slot: &'a RefCell<Option<H>>,
    phase: &'a Cell<Phase>,
    hook: Option<H>,
}

impl<'a, H> Lent<'a, H> {
    fn take(slot: &'a RefCell<Option<H>>, phase: &'a Cell<Phase>) -> Option<Self> {
        let hook = slot.borrow_mut().take()?;
        Some(Lent {
            slot,
            phase,
            hook: Some(hook),
        })
    }

    fn call<R>(mut self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
        self.hook.as_mut().map(f)
    }
}

impl<H> Drop for Lent<'_, H> {
    fn drop(&mut self) {
        let Some(hook) = self.hook.take() else {
            return;
        };
        if self.phase.get() == Phase::Done {
            return;
        }
        if let Ok(mut slot) = self.slot.try_borrow_mut() {
            if slot.is_none() {
                *slot = Some(hook);
            }
        }
    }
}

/// Pull node over a root
pub(crate) struct RootNode<T: 'static>(pub(crate) Rc<Root<T>>);

impl<T: 'static> Pull for RootNode<T> {
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        self.0.pull()
    }

    fn status(&self) -> Status {
        match self.0.phase() {
            Phase::Done => Status::Done,
            _ => Status::Active,
        }
    }
}

/// The producer's side of a stream: emit values and stop it.
///
/// Holds the stream weakly; once the stream is gone every call reports
/// [`StreamError::Closed`].
pub struct Emitter<T: 'static> {
    root: Weak<Root<T>>,
}

impl<T: 'static> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Emitter {
            root: self.root.clone(),
        }
    }
}

impl<T: 'static> Emitter<T> {
    fn root(&self) -> StreamResult<Rc<Root<T>>> {
        self.root.upgrade().ok_or(StreamError::Closed)
    }

    /// Buffer `value` and notify consumers
    pub fn emit(&self, value: T) -> StreamResult<()> {
        self.root()?.enqueue(value)
    }

    pub fn emit_all<I>(&self, values: I) -> StreamResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        let root = self.root()?;
        for value in values {
            root.enqueue(value)?;
        }
        Ok(())
    }

    /// Wake consumers without buffering anything, for producers that serve
    /// pulls themselves
    pub fn notify(&self) {
        if let Some(root) = self.root.upgrade() {
            root.notifier.notify();
        }
    }

    /// Stop once the buffered values are drained
    pub fn stop(&self) -> StreamResult<()> {
        self.root()?.schedule_stop(None);
        Ok(())
    }

    pub fn stop_after(&self, count: usize) -> StreamResult<()> {
        self.root()?.schedule_stop(Some(count));
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.root.upgrade().map_or(Phase::Done, |root| root.phase())
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.phase(), Phase::Stopping(_) | Phase::Done)
    }
}

impl<T: 'static> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter").field("phase", &self.phase()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffered(values: Vec<i32>) -> Rc<Root<i32>> {
        Root::new(values.into(), Box::new(|_| Producer::new().pushable()))
    }

    #[test]
    fn setup_runs_on_first_access() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let root: Rc<Root<i32>> = Root::new(
            VecDeque::new(),
            Box::new(move |_| {
                flag.set(true);
                Producer::new()
            }),
        );
        assert_eq!(root.phase(), Phase::Pending);
        assert!(!ran.get());
        assert_eq!(root.pull(), None);
        assert!(ran.get());
        assert_eq!(root.phase(), Phase::Active);
    }

    #[test]
    fn panicking_hooks_stay_installed() {
        let calls = Rc::new(Cell::new(0));
        let pulls = calls.clone();
        let pushes = calls.clone();
        let root: Rc<Root<i32>> = Root::new(
            VecDeque::new(),
            Box::new(move |_| {
                Producer::new()
                    .with_pull(move || {
                        pulls.set(pulls.get() + 1);
                        if pulls.get() == 1 {
                            panic!("first pull fails");
                        }
                        Some(pulls.get())
                    })
                    .on_push(move |value: i32| {
                        if value < 0 {
                            panic!("negative push");
                        }
                        pushes.set(pushes.get() + value);
                    })
            }),
        );
        let root_ref = &root;
        assert!(std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| root_ref.pull())).is_err());
        assert_eq!(root.pull(), Some(2));

        assert!(std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| root_ref.push(-1))).is_err());
        root.push(10).unwrap();
        assert_eq!(calls.get(), 12);

        root.stop(Some(1)).unwrap();
        assert_eq!(root.pull(), Some(13));
        assert_eq!(root.phase(), Phase::Done);
    }

    #[test]
    fn stop_counts_down_buffered_values() {
        let root = buffered(vec![1, 2, 3]);
        root.stop(None).unwrap();
        assert_eq!(root.phase(), Phase::Stopping(3));
        assert_eq!(root.pull(), Some(1));
        assert_eq!(root.phase(), Phase::Stopping(2));
        assert_eq!(root.pull(), Some(2));
        assert_eq!(root.pull(), Some(3));
        assert_eq!(root.phase(), Phase::Done);
        assert_eq!(root.pull(), None);
    }

    #[test]
    fn shorter_countdown_wins() {
        let root = buffered(vec![1, 2, 3]);
        root.stop(Some(2)).unwrap();
        root.stop(Some(3)).unwrap();
        assert_eq!(root.phase(), Phase::Stopping(2));
        root.stop(Some(1)).unwrap();
        assert_eq!(root.phase(), Phase::Stopping(1));
    }

    #[test]
    fn immediate_stop_discards_buffer() {
        let root = buffered(vec![1, 2]);
        root.stop(Some(0)).unwrap();
        assert_eq!(root.phase(), Phase::Done);
        assert_eq!(root.pull(), None);
        assert_eq!(root.push(3), Err(StreamError::Closed));
        assert_eq!(root.start(), Err(StreamError::Closed));
        assert_eq!(root.stop(None), Ok(()));
    }

    #[test]
    fn missing_capabilities_are_reported() {
        let root: Rc<Root<i32>> = Root::new(VecDeque::new(), Box::new(|_| Producer::new()));
        assert_eq!(root.push(1), Err(StreamError::Unpushable));
        assert_eq!(root.start(), Err(StreamError::Unstartable));
        assert_eq!(root.stop(None), Err(StreamError::Unstoppable));
    }

    #[test]
    fn stop_hook_runs_once() {
        let stops = Rc::new(Cell::new(0));
        let counter = stops.clone();
        let root: Rc<Root<i32>> = Root::new(
            vec![1].into(),
            Box::new(move |_| Producer::new().on_stop(move || counter.set(counter.get() + 1))),
        );
        root.stop(None).unwrap();
        assert_eq!(stops.get(), 1);
        assert_eq!(root.pull(), Some(1));
        assert_eq!(root.phase(), Phase::Done);
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn emitter_outlived_by_nothing_reports_closed() {
        let slot = Rc::new(RefCell::new(None));
        let keep = slot.clone();
        let root: Rc<Root<i32>> = Root::new(
            VecDeque::new(),
            Box::new(move |emitter| {
                *keep.borrow_mut() = Some(emitter);
                Producer::new()
            }),
        );
        root.ensure_setup();
        let emitter = slot.borrow_mut().take().unwrap();
        emitter.emit(7).unwrap();
        assert_eq!(root.pull(), Some(7));
        drop(root);
        assert_eq!(emitter.emit(8), Err(StreamError::Closed));
        assert_eq!(emitter.phase(), Phase::Done);
    }
}
