//! Lazy pull-based sequences
//!
//! A [`Functor`] wraps a single primitive, [`Pull::pull`], which hands out the
//! next value or `None` when nothing is available. Operators wrap a parent
//! source in a new node without consuming anything up front; values move only
//! when a consumer pulls.
//!
//! [`Sequence`] is the capability shared by [`Functor`] and
//! [`Stream`](crate::stream::Stream). Every operator in [`SequenceExt`] is
//! written once against it, so each operator is available on both.

pub mod operators;
pub mod sources;
pub mod tee;

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;

use operators::{
    Catch, Chunk, Concat, Dedup, Filter, Flat, Latest, Map, Rest, Scan, Sort, Split, Take, Tap,
    Unique,
};

pub use sources::Step;

/// Observable status of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// More values may still arrive
    Active,
    /// No value will ever be produced again
    Done,
}

impl Status {
    pub fn is_done(self) -> bool {
        self == Status::Done
    }
}

/// The pull primitive.
///
/// `pull` returns the next value or `None`. `None` from a source whose status
/// is [`Status::Active`] means "nothing ready yet"; once `status` reports
/// [`Status::Done`] every later `pull` must return `None`.
pub trait Pull {
    type Item;

    fn pull(&mut self) -> Option<Self::Item>;

    fn status(&self) -> Status {
        Status::Active
    }
}

/// A boxed pull node
pub type BoxPull<T> = Box<dyn Pull<Item = T>>;

impl<P: Pull + ?Sized> Pull for Box<P> {
    type Item = P::Item;

    fn pull(&mut self) -> Option<Self::Item> {
        (**self).pull()
    }

    fn status(&self) -> Status {
        (**self).status()
    }
}

/// A node that never yields anything
pub(crate) struct Exhausted<T>(std::marker::PhantomData<T>);

impl<T> Exhausted<T> {
    pub(crate) fn new() -> Self {
        Exhausted(std::marker::PhantomData)
    }
}

impl<T> Pull for Exhausted<T> {
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        None
    }

    fn status(&self) -> Status {
        Status::Done
    }
}

/// Capability shared by the two sequence variants, [`Functor`] and
/// [`Stream`](crate::stream::Stream).
pub trait Sequence: Sized + 'static {
    type Item: 'static;

    /// The variant an operator produces when it changes the item type
    type Derived<U: 'static>: Sequence<Item = U>;

    fn pull(&mut self) -> Option<Self::Item>;

    fn status(&self) -> Status;

    /// Turn this sequence into a pull node usable as an operator's parent
    fn into_pull(self) -> BoxPull<Self::Item>;

    /// Wrap this sequence's pull node in a new node, keeping the variant
    fn derive<U, F>(self, build: F) -> Self::Derived<U>
    where
        U: 'static,
        F: FnOnce(BoxPull<Self::Item>) -> BoxPull<U>;

    /// Exhaust this sequence, then continue into each of `rest` in order
    fn concat<I>(self, rest: I) -> Self
    where
        I: IntoIterator<Item = Self>;

    /// Split off a sibling that observes every value this sequence has not
    /// yet handed out. Both sides see the full remaining sequence once, in
    /// order, whatever the interleaving of their pulls.
    fn fork(&mut self) -> Self
    where
        Self::Item: Clone;
}

/// Operators available on every [`Sequence`]
pub trait SequenceExt: Sequence {
    /// Apply `f` to every value
    fn map<U, F>(self, f: F) -> Self::Derived<U>
    where
        U: 'static,
        F: FnMut(Self::Item) -> U + 'static,
    {
        self.derive(move |parent| Box::new(Map::new(parent, f)))
    }

    /// Keep only values for which `f` holds
    fn filter<F>(self, f: F) -> Self::Derived<Self::Item>
    where
        F: FnMut(&Self::Item) -> bool + 'static,
    {
        self.derive(move |parent| Box::new(Filter::new(parent, f)))
    }

    /// Drop values equal to the value pulled immediately before them
    fn dedup(self) -> Self::Derived<Self::Item>
    where
        Self::Item: PartialEq + Clone,
    {
        self.derive(|parent| Box::new(Dedup::new(parent)))
    }

    /// Drop values equal to any value seen before.
    ///
    /// Every distinct value is remembered for the lifetime of the node.
    fn unique(self) -> Self::Derived<Self::Item>
    where
        Self::Item: Eq + Hash + Clone,
    {
        self.derive(|parent| Box::new(Unique::new(parent)))
    }

    /// Yield at most `n` values, then report done
    fn take(self, n: usize) -> Self::Derived<Self::Item> {
        self.derive(move |parent| Box::new(Take::new(parent, n)))
    }

    /// Discard the first `n` values
    fn rest(self, n: usize) -> Self::Derived<Self::Item> {
        self.derive(move |parent| Box::new(Rest::new(parent, n)))
    }

    /// Emit the running accumulator after folding in each value
    fn scan<A, F>(self, seed: A, f: F) -> Self::Derived<A>
    where
        A: Clone + 'static,
        F: FnMut(A, Self::Item) -> A + 'static,
    {
        self.derive(move |parent| Box::new(Scan::new(parent, seed, f)))
    }

    /// Batch exactly `size` values per emission.
    ///
    /// A trailing batch shorter than `size` is never emitted.
    fn chunk(self, size: usize) -> Self::Derived<Vec<Self::Item>> {
        assert!(size > 0, "chunk: size must be greater than zero");
        self.derive(move |parent| Box::new(Chunk::new(parent, size)))
    }

    /// Flatten one level, draining each inner collection before the next
    fn flat(self) -> Self::Derived<<Self::Item as IntoIterator>::Item>
    where
        Self::Item: IntoIterator,
        <Self::Item as IntoIterator>::IntoIter: 'static,
        <Self::Item as IntoIterator>::Item: 'static,
    {
        self.derive(|parent| Box::new(Flat::new(parent)))
    }

    /// `map(f)` followed by `flat()`
    fn flat_map<I, F>(self, f: F) -> Self::Derived<I::Item>
    where
        I: IntoIterator + 'static,
        I::IntoIter: 'static,
        I::Item: 'static,
        F: FnMut(Self::Item) -> I + 'static,
    {
        self.derive(move |parent| Box::new(Flat::new(Map::new(parent, f))))
    }

    /// Sort by `compare`. Not lazy: drains everything the parent has
    /// available before yielding the first value.
    fn sort_by<F>(self, compare: F) -> Self::Derived<Self::Item>
    where
        F: FnMut(&Self::Item, &Self::Item) -> Ordering + 'static,
    {
        self.derive(move |parent| Box::new(Sort::new(parent, compare)))
    }

    fn sort(self) -> Self::Derived<Self::Item>
    where
        Self::Item: Ord,
    {
        self.sort_by(|a, b| a.cmp(b))
    }

    /// Group consecutive values, opening a new group at every value for
    /// which `f` holds. The last group is flushed when the parent is done.
    fn split<F>(self, f: F) -> Self::Derived<Vec<Self::Item>>
    where
        F: FnMut(&Self::Item) -> bool + 'static,
    {
        self.derive(move |parent| Box::new(Split::new(parent, f)))
    }

    /// Drain what is available and yield only the most recent value
    fn latest(self) -> Self::Derived<Self::Item> {
        self.derive(|parent| Box::new(Latest::new(parent)))
    }

    /// Replace `Err` items with `f(error)`
    fn catch<T, E, F>(self, f: F) -> Self::Derived<T>
    where
        Self: Sequence<Item = Result<T, E>>,
        T: 'static,
        E: 'static,
        F: FnMut(E) -> T + 'static,
    {
        self.derive(move |parent| Box::new(Catch::new(parent, f)))
    }

    /// Observe each value as it passes
    fn tap<F>(self, f: F) -> Self::Derived<Self::Item>
    where
        F: FnMut(&Self::Item) + 'static,
    {
        self.derive(move |parent| Box::new(Tap::new(parent, f)))
    }
}

impl<S: Sequence> SequenceExt for S {}

/// A read-only, single-consumer lazy sequence.
///
/// Once a pull has returned `None` the functor is done and stays done.
pub struct Functor<T: 'static> {
    source: BoxPull<T>,
    done: bool,
}

impl<T: 'static> Functor<T> {
    /// Wrap any pull source
    pub fn from_source<P>(source: P) -> Self
    where
        P: Pull<Item = T> + 'static,
    {
        Functor {
            source: Box::new(source),
            done: false,
        }
    }

    pub fn empty() -> Self {
        Self::from_source(Exhausted::new())
    }

    pub fn pull(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        let value = self.source.pull();
        if value.is_none() {
            self.done = true;
        }
        value
    }

    pub fn status(&self) -> Status {
        if self.done {
            Status::Done
        } else {
            self.source.status()
        }
    }

    /// Drain into a vector
    pub fn to_vec(mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.pull() {
            values.push(value);
        }
        values
    }

    /// Drain, calling `f` for each value
    pub fn each<F>(mut self, mut f: F)
    where
        F: FnMut(T),
    {
        while let Some(value) = self.pull() {
            f(value);
        }
    }

    pub fn fold<A, F>(mut self, seed: A, mut f: F) -> A
    where
        F: FnMut(A, T) -> A,
    {
        let mut acc = seed;
        while let Some(value) = self.pull() {
            acc = f(acc, value);
        }
        acc
    }

    /// Fold using the first value as the seed. `None` when empty.
    pub fn reduce<F>(mut self, f: F) -> Option<T>
    where
        F: FnMut(T, T) -> T,
    {
        let seed = self.pull()?;
        Some(self.fold(seed, f))
    }

    pub fn first(mut self) -> Option<T> {
        self.pull()
    }

    pub fn last(mut self) -> Option<T> {
        let mut last = None;
        while let Some(value) = self.pull() {
            last = Some(value);
        }
        last
    }
}

impl<T: 'static> Pull for Functor<T> {
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        Functor::pull(self)
    }

    fn status(&self) -> Status {
        Functor::status(self)
    }
}

impl<T: 'static> Sequence for Functor<T> {
    type Item = T;
    type Derived<U: 'static> = Functor<U>;

    fn pull(&mut self) -> Option<T> {
        Functor::pull(self)
    }

    fn status(&self) -> Status {
        Functor::status(self)
    }

    fn into_pull(self) -> BoxPull<T> {
        Box::new(self)
    }

    fn derive<U, F>(self, build: F) -> Functor<U>
    where
        U: 'static,
        F: FnOnce(BoxPull<T>) -> BoxPull<U>,
    {
        Functor {
            source: build(Box::new(self)),
            done: false,
        }
    }

    fn concat<I>(self, rest: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut parts: VecDeque<BoxPull<T>> = VecDeque::new();
        parts.push_back(self.into_pull());
        parts.extend(rest.into_iter().map(Sequence::into_pull));
        Functor::from_source(Concat::new(parts))
    }

    fn fork(&mut self) -> Self
    where
        T: Clone,
    {
        let source = std::mem::replace(&mut self.source, Box::new(Exhausted::new()));
        let (left, right) = tee::tee(source);
        self.source = Box::new(left);
        Functor {
            source: Box::new(right),
            done: self.done,
        }
    }
}

impl<T: 'static> IntoIterator for Functor<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { functor: self }
    }
}

/// Iterator over the values of a [`Functor`]
pub struct IntoIter<T: 'static> {
    functor: Functor<T>,
}

impl<T: 'static> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.functor.pull()
    }
}

impl<T: 'static> fmt::Debug for Functor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Functor")
            .field("status", &self.status())
            .finish()
    }
}
