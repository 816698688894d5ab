//! Source adapters
//!
//! Turn arrays, iterators, pull closures, iterator-protocol closures and
//! dynamic JSON values into [`Functor`]s.

use std::collections::VecDeque;

use serde_json::Value;

use super::{Functor, Pull, Status};
use crate::error::{StreamError, StreamResult};

/// Array-like source pulled by position. `None` slots are holes: they are
/// skipped, never treated as the end.
pub struct ArrayLike<T> {
    slots: VecDeque<Option<T>>,
    remaining: usize,
}

impl<T> ArrayLike<T> {
    pub fn new(slots: Vec<Option<T>>) -> Self {
        let remaining = slots.iter().filter(|slot| slot.is_some()).count();
        ArrayLike {
            slots: slots.into(),
            remaining,
        }
    }
}

impl<T> Pull for ArrayLike<T> {
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        while let Some(slot) = self.slots.pop_front() {
            if let Some(value) = slot {
                self.remaining -= 1;
                return Some(value);
            }
        }
        None
    }

    fn status(&self) -> Status {
        if self.remaining == 0 {
            Status::Done
        } else {
            Status::Active
        }
    }
}

/// Source backed by a std iterator
pub struct IterSource<I> {
    iter: I,
    done: bool,
}

impl<I> IterSource<I> {
    pub fn new(iter: I) -> Self {
        IterSource { iter, done: false }
    }
}

impl<I: Iterator> Pull for IterSource<I> {
    type Item = I::Item;

    fn pull(&mut self) -> Option<I::Item> {
        if self.done {
            return None;
        }
        let value = self.iter.next();
        self.done = value.is_none();
        value
    }

    fn status(&self) -> Status {
        if self.done {
            Status::Done
        } else {
            Status::Active
        }
    }
}

/// Source delegating to a pull closure
pub struct PullFn<F> {
    f: F,
}

impl<T, F> Pull for PullFn<F>
where
    F: FnMut() -> Option<T>,
{
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        (self.f)()
    }
}

/// One result of an iterator-protocol `next()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// A value, more may follow
    Yield(T),
    /// End of sequence, optionally carrying one final value
    Return(Option<T>),
}

/// Source driving an iterator-protocol closure
pub struct Steps<F> {
    next: F,
    done: bool,
}

impl<T, F> Pull for Steps<F>
where
    F: FnMut() -> Step<T>,
{
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        match (self.next)() {
            Step::Yield(value) => Some(value),
            Step::Return(last) => {
                self.done = true;
                last
            }
        }
    }

    fn status(&self) -> Status {
        if self.done {
            Status::Done
        } else {
            Status::Active
        }
    }
}

impl<T: 'static> Functor<T> {
    /// Functor over the given values, in order
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::from_slots(values.into_iter().map(Some).collect())
    }

    /// Array-like functor whose `None` slots are skipped
    pub fn from_slots(slots: Vec<Option<T>>) -> Self {
        Self::from_source(ArrayLike::new(slots))
    }

    /// Lazily pull from any iterable
    pub fn from_iterable<I>(iterable: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Self::from_source(IterSource::new(iterable.into_iter()))
    }

    /// Delegate directly to a pull closure
    pub fn from_pull<F>(f: F) -> Self
    where
        F: FnMut() -> Option<T> + 'static,
    {
        Self::from_source(PullFn { f })
    }

    /// Drive an iterator-protocol closure. `Step::Return(Some(x))` yields `x`
    /// as the last value; `Step::Return(None)` ends without one.
    pub fn from_steps<F>(next: F) -> Self
    where
        F: FnMut() -> Step<T> + 'static,
    {
        Self::from_source(Steps { next, done: false })
    }
}

impl Functor<Value> {
    /// Adapt a dynamic JSON value.
    ///
    /// Arrays are pulled by index and objects with a numeric `length` are
    /// treated as array-likes keyed `"0"`, `"1"`, ... In both cases `null`
    /// and missing entries are holes. Anything else fails with
    /// [`StreamError::UnsupportedSourceKind`].
    pub fn from_json(value: Value) -> StreamResult<Self> {
        match value {
            Value::Array(items) => Ok(Self::from_slots(
                items.into_iter().map(present).collect(),
            )),
            Value::Object(mut map) => {
                let length = map
                    .get("length")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| StreamError::UnsupportedSourceKind("object".to_string()))?;
                let slots = (0..length)
                    .map(|index| map.remove(&index.to_string()).and_then(present))
                    .collect();
                Ok(Self::from_slots(slots))
            }
            other => Err(StreamError::UnsupportedSourceKind(
                kind_of(&other).to_string(),
            )),
        }
    }
}

fn present(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        value => Some(value),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
