use std::cell::{Cell, RefCell};

use crate::timing;

type Callback = Box<dyn FnOnce()>;

/// One-shot completion signal of a stream.
///
/// Callbacks never run synchronously inside `on_done` or `finish`; they are
/// handed to the current scheduler's tick queue.
#[derive(Default)]
pub(crate) struct Lifecycle {
    finished: Cell<bool>,
    callbacks: RefCell<Vec<Callback>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Returns false when already finished
    pub(crate) fn finish(&self) -> bool {
        if self.finished.replace(true) {
            return false;
        }
        let callbacks = std::mem::take(&mut *self.callbacks.borrow_mut());
        if !callbacks.is_empty() {
            timing::request_tick(move || {
                for callback in callbacks {
                    callback();
                }
            });
        }
        true
    }

    pub(crate) fn on_done(&self, callback: Callback) {
        if self.finished.get() {
            timing::request_tick(callback);
        } else {
            self.callbacks.borrow_mut().push(callback);
        }
    }
}
