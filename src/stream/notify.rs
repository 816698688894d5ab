//! Pull notifications
//!
//! A [`Notifier`] tells listeners that a stream may have something new to
//! pull. Listeners are plain callbacks; returning `false` from one
//! unsubscribes it. Task wakers are kept alongside so async consumers can
//! park on the same event.
//!
//! Notifications raised while a pull is in progress on this thread are
//! queued and delivered once the outermost pull returns, so a listener never
//! runs inside another stream's pull.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use crate::timing;

/// Handle returned by [`Stream::on_notify`](crate::stream::Stream::on_notify)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type Listener = Rc<dyn Fn() -> bool>;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static DEFERRED: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
}

/// Marks a pull in progress. Deferred notifications flush when the outermost
/// guard drops, followed by any work queued on the fallback scheduler.
pub(crate) struct PullGuard(());

impl PullGuard {
    pub(crate) fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        PullGuard(())
    }
}

impl Drop for PullGuard {
    fn drop(&mut self) {
        let outermost = DEPTH.with(|depth| {
            let next = depth.get() - 1;
            depth.set(next);
            next == 0
        });
        if outermost && !std::thread::panicking() {
            flush();
            timing::run_pending();
        }
    }
}

fn flush() {
    loop {
        let task = DEFERRED.with(|queue| queue.borrow_mut().pop_front());
        match task {
            Some(task) => task(),
            None => break,
        }
    }
}

fn dispatch(task: Box<dyn FnOnce()>) {
    if DEPTH.with(Cell::get) > 0 {
        DEFERRED.with(|queue| queue.borrow_mut().push_back(task));
    } else {
        task();
    }
}

struct State {
    /// `None` once closed
    listeners: Option<Vec<(ListenerId, Listener)>>,
    wakers: Vec<Waker>,
    next_id: u64,
}

pub(crate) struct Notifier {
    state: RefCell<State>,
    epoch: Cell<u64>,
}

impl Notifier {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Notifier {
            state: RefCell::new(State {
                listeners: Some(Vec::new()),
                wakers: Vec::new(),
                next_id: 0,
            }),
            epoch: Cell::new(0),
        })
    }

    /// A notifier that fires whenever `parent` does
    pub(crate) fn child_of(parent: &Notifier) -> Rc<Self> {
        let child = Self::new();
        child.follow(parent);
        child
    }

    /// Forward every notification of `parent` to this notifier for as long
    /// as this notifier is alive and open
    pub(crate) fn follow(self: &Rc<Self>, parent: &Notifier) {
        let child: Weak<Notifier> = Rc::downgrade(self);
        parent.on(Rc::new(move || match child.upgrade() {
            Some(child) if !child.is_closed() => {
                child.notify();
                true
            }
            _ => false,
        }));
    }

    pub(crate) fn on(&self, listener: Listener) -> Option<ListenerId> {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.listeners.as_mut()?.push((id, listener));
        Some(id)
    }

    pub(crate) fn off(&self, id: ListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.listeners.as_mut() {
            Some(listeners) => {
                let before = listeners.len();
                listeners.retain(|(listener, _)| *listener != id);
                before != listeners.len()
            }
            None => false,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.borrow().listeners.is_none()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub(crate) fn register_waker(&self, waker: &Waker) {
        let mut state = self.state.borrow_mut();
        if !state.wakers.iter().any(|known| known.will_wake(waker)) {
            state.wakers.push(waker.clone());
        }
    }

    /// Tell every listener there may be something to pull
    pub(crate) fn notify(self: &Rc<Self>) {
        if self.is_closed() {
            return;
        }
        self.bump();
        let this = Rc::clone(self);
        dispatch(Box::new(move || this.deliver()));
    }

    /// Deliver a final notification and drop every listener. Later `on`
    /// calls are refused.
    pub(crate) fn close(self: &Rc<Self>) {
        let listeners = self.state.borrow_mut().listeners.take();
        let Some(listeners) = listeners else {
            return;
        };
        self.bump();
        log::trace!("notifier closed with {} listener(s)", listeners.len());
        dispatch(Box::new(move || {
            for (_, listener) in listeners {
                listener();
            }
        }));
    }

    pub(crate) fn notified(self: &Rc<Self>) -> Notified {
        Notified {
            notifier: Rc::clone(self),
            seen: self.epoch(),
        }
    }

    fn bump(&self) {
        self.epoch.set(self.epoch.get().wrapping_add(1));
        let wakers = std::mem::take(&mut self.state.borrow_mut().wakers);
        for waker in wakers {
            waker.wake();
        }
    }

    fn deliver(&self) {
        let snapshot: Vec<(ListenerId, Listener)> = match &self.state.borrow().listeners {
            Some(listeners) => listeners.clone(),
            None => return,
        };
        log::trace!("notifying {} listener(s)", snapshot.len());
        for (id, listener) in snapshot {
            if !self.is_registered(id) {
                continue;
            }
            if !listener() {
                self.off(id);
            }
        }
    }

    fn is_registered(&self, id: ListenerId) -> bool {
        match &self.state.borrow().listeners {
            Some(listeners) => listeners.iter().any(|(listener, _)| *listener == id),
            None => false,
        }
    }
}

/// Resolves at the next notification after it was created
pub(crate) struct Notified {
    notifier: Rc<Notifier>,
    seen: u64,
}

impl Future for Notified {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.notifier.epoch() != self.seen {
            return Poll::Ready(());
        }
        self.notifier.register_waker(cx.waker());
        Poll::Pending
    }
}
