//! Two-sided tee used by `fork`.
//!
//! A value pulled from the shared source by one side is queued for the other,
//! so each side observes the whole sequence exactly once.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{BoxPull, Pull, Status};

struct Tee<T> {
    source: BoxPull<T>,
    queues: [VecDeque<T>; 2],
}

pub struct TeeSide<T> {
    shared: Rc<RefCell<Tee<T>>>,
    side: usize,
}

pub fn tee<T: Clone>(source: BoxPull<T>) -> (TeeSide<T>, TeeSide<T>) {
    let shared = Rc::new(RefCell::new(Tee {
        source,
        queues: [VecDeque::new(), VecDeque::new()],
    }));
    (
        TeeSide {
            shared: Rc::clone(&shared),
            side: 0,
        },
        TeeSide { shared, side: 1 },
    )
}

impl<T: Clone> Pull for TeeSide<T> {
    type Item = T;

    fn pull(&mut self) -> Option<T> {
        let Ok(mut tee) = self.shared.try_borrow_mut() else {
            log::warn!("fork: pull on one side re-entered from the other; nothing pulled");
            return None;
        };
        if let Some(value) = tee.queues[self.side].pop_front() {
            return Some(value);
        }
        let value = tee.source.pull()?;
        tee.queues[1 - self.side].push_back(value.clone());
        Some(value)
    }

    fn status(&self) -> Status {
        match self.shared.try_borrow() {
            Ok(tee) if tee.queues[self.side].is_empty() => tee.source.status(),
            _ => Status::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functor::sources::ArrayLike;

    #[test]
    fn interleaved_pulls_see_everything_once() {
        let (mut left, mut right) = tee(Box::new(ArrayLike::new(vec![Some(1), Some(2), Some(3)])));
        assert_eq!(left.pull(), Some(1));
        assert_eq!(left.pull(), Some(2));
        assert_eq!(right.pull(), Some(1));
        assert_eq!(left.pull(), Some(3));
        assert_eq!(left.pull(), None);
        assert_eq!(left.status(), Status::Done);
        assert_eq!(right.status(), Status::Active);
        assert_eq!(right.pull(), Some(2));
        assert_eq!(right.pull(), Some(3));
        assert_eq!(right.status(), Status::Done);
    }
}
