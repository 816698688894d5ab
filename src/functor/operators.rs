//! Operator nodes
//!
//! Each node owns its parent and implements [`Pull`]. Nodes never buffer
//! ahead of a pull except where noted (`Sort`, `Latest`).

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use super::{BoxPull, Pull, Status};

pub struct Map<P, F> {
    parent: P,
    f: F,
}

impl<P, F> Map<P, F> {
    pub fn new(parent: P, f: F) -> Self {
        Map { parent, f }
    }
}

impl<P, U, F> Pull for Map<P, F>
where
    P: Pull,
    F: FnMut(P::Item) -> U,
{
    type Item = U;

    fn pull(&mut self) -> Option<U> {
        self.parent.pull().map(&mut self.f)
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Filter<P, F> {
    parent: P,
    f: F,
}

impl<P, F> Filter<P, F> {
    pub fn new(parent: P, f: F) -> Self {
        Filter { parent, f }
    }
}

impl<P, F> Pull for Filter<P, F>
where
    P: Pull,
    F: FnMut(&P::Item) -> bool,
{
    type Item = P::Item;

    fn pull(&mut self) -> Option<P::Item> {
        loop {
            let value = self.parent.pull()?;
            if (self.f)(&value) {
                return Some(value);
            }
        }
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Dedup<P: Pull> {
    parent: P,
    last: Option<P::Item>,
}

impl<P: Pull> Dedup<P> {
    pub fn new(parent: P) -> Self {
        Dedup { parent, last: None }
    }
}

impl<P> Pull for Dedup<P>
where
    P: Pull,
    P::Item: PartialEq + Clone,
{
    type Item = P::Item;

    fn pull(&mut self) -> Option<P::Item> {
        loop {
            let value = self.parent.pull()?;
            if self.last.as_ref() != Some(&value) {
                self.last = Some(value.clone());
                return Some(value);
            }
        }
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Unique<P: Pull> {
    parent: P,
    seen: HashSet<P::Item>,
}

impl<P: Pull> Unique<P> {
    pub fn new(parent: P) -> Self {
        Unique {
            parent,
            seen: HashSet::new(),
        }
    }
}

impl<P> Pull for Unique<P>
where
    P: Pull,
    P::Item: Eq + Hash + Clone,
{
    type Item = P::Item;

    fn pull(&mut self) -> Option<P::Item> {
        loop {
            let value = self.parent.pull()?;
            if self.seen.insert(value.clone()) {
                return Some(value);
            }
        }
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Take<P> {
    parent: P,
    remaining: usize,
}

impl<P> Take<P> {
    pub fn new(parent: P, n: usize) -> Self {
        Take {
            parent,
            remaining: n,
        }
    }
}

impl<P: Pull> Pull for Take<P> {
    type Item = P::Item;

    fn pull(&mut self) -> Option<P::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.parent.pull()?;
        self.remaining -= 1;
        Some(value)
    }

    fn status(&self) -> Status {
        if self.remaining == 0 {
            Status::Done
        } else {
            self.parent.status()
        }
    }
}

pub struct Rest<P> {
    parent: P,
    skip: usize,
}

impl<P> Rest<P> {
    pub fn new(parent: P, n: usize) -> Self {
        Rest { parent, skip: n }
    }
}

impl<P: Pull> Pull for Rest<P> {
    type Item = P::Item;

    fn pull(&mut self) -> Option<P::Item> {
        // The count survives a parent that has nothing ready yet
        while self.skip > 0 {
            self.parent.pull()?;
            self.skip -= 1;
        }
        self.parent.pull()
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Scan<P, A, F> {
    parent: P,
    acc: A,
    f: F,
}

impl<P, A, F> Scan<P, A, F> {
    pub fn new(parent: P, seed: A, f: F) -> Self {
        Scan {
            parent,
            acc: seed,
            f,
        }
    }
}

impl<P, A, F> Pull for Scan<P, A, F>
where
    P: Pull,
    A: Clone,
    F: FnMut(A, P::Item) -> A,
{
    type Item = A;

    fn pull(&mut self) -> Option<A> {
        let value = self.parent.pull()?;
        self.acc = (self.f)(self.acc.clone(), value);
        Some(self.acc.clone())
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Chunk<P: Pull> {
    parent: P,
    size: usize,
    batch: Vec<P::Item>,
}

impl<P: Pull> Chunk<P> {
    pub fn new(parent: P, size: usize) -> Self {
        Chunk {
            parent,
            size,
            batch: Vec::with_capacity(size),
        }
    }
}

impl<P: Pull> Pull for Chunk<P> {
    type Item = Vec<P::Item>;

    fn pull(&mut self) -> Option<Vec<P::Item>> {
        while self.batch.len() < self.size {
            let value = self.parent.pull()?;
            self.batch.push(value);
        }
        Some(std::mem::replace(
            &mut self.batch,
            Vec::with_capacity(self.size),
        ))
    }

    // A partial batch is abandoned, so the parent's status is ours
    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Flat<P>
where
    P: Pull,
    P::Item: IntoIterator,
{
    parent: P,
    current: Option<<P::Item as IntoIterator>::IntoIter>,
}

impl<P> Flat<P>
where
    P: Pull,
    P::Item: IntoIterator,
{
    pub fn new(parent: P) -> Self {
        Flat {
            parent,
            current: None,
        }
    }
}

impl<P> Pull for Flat<P>
where
    P: Pull,
    P::Item: IntoIterator,
{
    type Item = <P::Item as IntoIterator>::Item;

    fn pull(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = self.current.as_mut() {
                if let Some(value) = inner.next() {
                    return Some(value);
                }
                self.current = None;
            }
            let next = self.parent.pull()?;
            self.current = Some(next.into_iter());
        }
    }

    fn status(&self) -> Status {
        if self.current.is_none() {
            self.parent.status()
        } else {
            Status::Active
        }
    }
}

pub struct Sort<P: Pull, F> {
    parent: P,
    compare: F,
    sorted: VecDeque<P::Item>,
}

impl<P: Pull, F> Sort<P, F> {
    pub fn new(parent: P, compare: F) -> Self {
        Sort {
            parent,
            compare,
            sorted: VecDeque::new(),
        }
    }
}

impl<P, F> Pull for Sort<P, F>
where
    P: Pull,
    F: FnMut(&P::Item, &P::Item) -> Ordering,
{
    type Item = P::Item;

    fn pull(&mut self) -> Option<P::Item> {
        if self.sorted.is_empty() {
            let mut batch = Vec::new();
            while let Some(value) = self.parent.pull() {
                batch.push(value);
            }
            batch.sort_by(&mut self.compare);
            self.sorted = batch.into();
        }
        self.sorted.pop_front()
    }

    fn status(&self) -> Status {
        if self.sorted.is_empty() {
            self.parent.status()
        } else {
            Status::Active
        }
    }
}

pub struct Split<P: Pull, F> {
    parent: P,
    f: F,
    group: Vec<P::Item>,
}

impl<P: Pull, F> Split<P, F> {
    pub fn new(parent: P, f: F) -> Self {
        Split {
            parent,
            f,
            group: Vec::new(),
        }
    }
}

impl<P, F> Pull for Split<P, F>
where
    P: Pull,
    F: FnMut(&P::Item) -> bool,
{
    type Item = Vec<P::Item>;

    fn pull(&mut self) -> Option<Vec<P::Item>> {
        loop {
            match self.parent.pull() {
                Some(value) => {
                    if (self.f)(&value) && !self.group.is_empty() {
                        return Some(std::mem::replace(&mut self.group, vec![value]));
                    }
                    self.group.push(value);
                }
                None => {
                    if self.parent.status().is_done() && !self.group.is_empty() {
                        return Some(std::mem::take(&mut self.group));
                    }
                    return None;
                }
            }
        }
    }

    fn status(&self) -> Status {
        if self.group.is_empty() {
            self.parent.status()
        } else {
            Status::Active
        }
    }
}

pub struct Latest<P> {
    parent: P,
}

impl<P> Latest<P> {
    pub fn new(parent: P) -> Self {
        Latest { parent }
    }
}

impl<P: Pull> Pull for Latest<P> {
    type Item = P::Item;

    fn pull(&mut self) -> Option<P::Item> {
        let mut latest = None;
        while let Some(value) = self.parent.pull() {
            latest = Some(value);
        }
        latest
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Concat<T> {
    parts: VecDeque<BoxPull<T>>,
}

impl<T> Concat<T> {
    pub fn new(parts: VecDeque<BoxPull<T>>) -> Self {
        Concat { parts }
    }
}

impl<T> Pull for Concat<T> {
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        while let Some(front) = self.parts.front_mut() {
            if let Some(value) = front.pull() {
                return Some(value);
            }
            if !front.status().is_done() {
                return None;
            }
            self.parts.pop_front();
        }
        None
    }

    fn status(&self) -> Status {
        if self.parts.iter().all(|part| part.status().is_done()) {
            Status::Done
        } else {
            Status::Active
        }
    }
}

pub struct Catch<P, F> {
    parent: P,
    f: F,
}

impl<P, F> Catch<P, F> {
    pub fn new(parent: P, f: F) -> Self {
        Catch { parent, f }
    }
}

impl<P, T, E, F> Pull for Catch<P, F>
where
    P: Pull<Item = Result<T, E>>,
    F: FnMut(E) -> T,
{
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        match self.parent.pull()? {
            Ok(value) => Some(value),
            Err(error) => Some((self.f)(error)),
        }
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}

pub struct Tap<P, F> {
    parent: P,
    f: F,
}

impl<P, F> Tap<P, F> {
    pub fn new(parent: P, f: F) -> Self {
        Tap { parent, f }
    }
}

impl<P, F> Pull for Tap<P, F>
where
    P: Pull,
    F: FnMut(&P::Item),
{
    type Item = P::Item;

    fn pull(&mut self) -> Option<P::Item> {
        let value = self.parent.pull()?;
        (self.f)(&value);
        Some(value)
    }

    fn status(&self) -> Status {
        self.parent.status()
    }
}
