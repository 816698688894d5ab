use pullstream::prelude::*;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_of_yields_in_order_then_done() {
    let mut functor = Functor::of(vec![1, 2, 3]);
    assert_eq!(functor.pull(), Some(1));
    assert_eq!(functor.pull(), Some(2));
    assert_eq!(functor.pull(), Some(3));
    assert_eq!(functor.pull(), None);
    assert_eq!(functor.status(), Status::Done);
}

#[test]
fn test_holes_are_skipped() {
    let functor = Functor::from_slots(vec![Some(1), None, None, Some(4), None]);
    assert_eq!(functor.to_vec(), vec![1, 4]);
}

#[test]
fn test_iterator_protocol_final_value() {
    let mut n = 0;
    let functor = Functor::from_steps(move || {
        n += 1;
        if n < 3 {
            Step::Yield(n)
        } else {
            Step::Return(Some(99))
        }
    });
    assert_eq!(functor.to_vec(), vec![1, 2, 99]);

    let empty_return = Functor::<i32>::from_steps(|| Step::Return(None));
    assert!(empty_return.to_vec().is_empty());
}

#[test]
fn test_from_json_sources() {
    let array = Functor::from_json(json!([1, null, 3])).unwrap();
    assert_eq!(array.to_vec(), vec![json!(1), json!(3)]);

    for (value, kind) in [
        (json!(7), "number"),
        (json!(true), "boolean"),
        (json!({"a": 1}), "object"),
    ] {
        assert_eq!(
            Functor::from_json(value).unwrap_err(),
            StreamError::UnsupportedSourceKind(kind.to_string())
        );
    }
}

#[test]
fn test_map_filter() {
    let values = Functor::from_iterable(1..=10)
        .filter(|x| x % 2 == 0)
        .map(|x| x * x)
        .to_vec();
    assert_eq!(values, vec![4, 16, 36, 64, 100]);
}

#[test]
fn test_dedup_scenario() {
    let values = Functor::of(vec![1, 1, 2, 2, 2, 3, 1]).dedup().to_vec();
    assert_eq!(values, vec![1, 2, 3, 1]);
}

#[test]
fn test_unique() {
    let values = Functor::of(vec![1, 1, 2, 2, 2, 3, 1]).unique().to_vec();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn test_chunk_drops_trailing_partial() {
    let chunks = Functor::of(vec![1, 2, 3, 4, 5]).chunk(2).to_vec();
    assert_eq!(chunks, vec![vec![1, 2], vec![3, 4]]);
}

#[test]
#[should_panic(expected = "size must be greater than zero")]
fn test_chunk_of_zero_panics() {
    let _ = Functor::of(vec![1]).chunk(0);
}

#[test]
fn test_take_and_rest() {
    assert_eq!(Functor::from_iterable(0..).take(3).to_vec(), vec![0, 1, 2]);
    assert_eq!(Functor::of(vec![1, 2, 3]).rest(1).to_vec(), vec![2, 3]);

    let mut none = Functor::of(vec![1, 2]).take(0);
    assert_eq!(none.status(), Status::Done);
    assert_eq!(none.pull(), None);
}

#[test]
fn test_take_does_not_overpull() {
    let pulled = Rc::new(RefCell::new(Vec::new()));
    let seen = pulled.clone();
    let values = Functor::from_iterable(1..)
        .tap(move |x| seen.borrow_mut().push(*x))
        .take(2)
        .to_vec();
    assert_eq!(values, vec![1, 2]);
    assert_eq!(*pulled.borrow(), vec![1, 2]);
}

#[test]
fn test_scan_emits_running_accumulator() {
    let sums = Functor::of(vec![1, 2, 3, 4]).scan(0, |acc, x| acc + x).to_vec();
    assert_eq!(sums, vec![1, 3, 6, 10]);
}

#[test]
fn test_flat_and_flat_map() {
    let flat = Functor::of(vec![vec![1, 2], vec![], vec![3]]).flat().to_vec();
    assert_eq!(flat, vec![1, 2, 3]);

    let words = Functor::of(vec!["a b", "c"])
        .flat_map(|line| line.split(' ').map(str::to_string).collect::<Vec<_>>())
        .to_vec();
    assert_eq!(words, vec!["a", "b", "c"]);
}

#[test]
fn test_sort() {
    assert_eq!(Functor::of(vec![3, 1, 2]).sort().to_vec(), vec![1, 2, 3]);
    let descending = Functor::of(vec![3, 1, 2]).sort_by(|a, b| b.cmp(a)).to_vec();
    assert_eq!(descending, vec![3, 2, 1]);
}

#[test]
fn test_split_starts_group_at_match() {
    let groups = Functor::of(vec![1, 2, 0, 3, 0, 4, 5])
        .split(|x| *x == 0)
        .to_vec();
    assert_eq!(groups, vec![vec![1, 2], vec![0, 3], vec![0, 4, 5]]);
}

#[test]
fn test_latest_keeps_last_available() {
    let mut latest = Functor::of(vec![1, 2, 3]).latest();
    assert_eq!(latest.pull(), Some(3));
    assert_eq!(latest.pull(), None);
}

#[test]
fn test_concat_in_argument_order() {
    let values = Functor::of(vec![1, 2])
        .concat(vec![Functor::empty(), Functor::of(vec![3]), Functor::of(vec![4, 5])])
        .to_vec();
    assert_eq!(values, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_catch_substitutes_errors() {
    let parsed = Functor::of(vec!["1", "x", "3"])
        .map(|s| s.parse::<i32>())
        .catch(|_| -1)
        .to_vec();
    assert_eq!(parsed, vec![1, -1, 3]);
}

#[test]
fn test_uncaught_error_reaches_the_puller() {
    let mut parsed = Functor::of(vec!["x"]).map(|s| s.parse::<i32>());
    assert!(parsed.pull().unwrap().is_err());
}

#[test]
fn test_fork_interleaved() {
    let mut left = Functor::of(vec![1, 2, 3]);
    let mut right = left.fork();
    assert_eq!(right.pull(), Some(1));
    assert_eq!(left.pull(), Some(1));
    assert_eq!(left.pull(), Some(2));
    assert_eq!(left.pull(), Some(3));
    assert_eq!(right.to_vec(), vec![2, 3]);
    assert_eq!(left.pull(), None);
}

#[test]
fn test_consumers() {
    assert_eq!(Functor::of(vec![1, 2, 3]).fold(0, |a, b| a + b), 6);
    assert_eq!(Functor::of(vec![1, 2, 3]).reduce(|a, b| a * b), Some(6));
    assert_eq!(Functor::<i32>::empty().reduce(|a, b| a + b), None);
    assert_eq!(Functor::of(vec![1, 2, 3]).first(), Some(1));
    assert_eq!(Functor::of(vec![1, 2, 3]).last(), Some(3));

    let mut seen = Vec::new();
    Functor::of(vec!['a', 'b']).each(|c| seen.push(c));
    assert_eq!(seen, vec!['a', 'b']);
}

struct Countdown(u32);

impl Pull for Countdown {
    type Item = u32;

    fn pull(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        self.0 -= 1;
        Some(self.0)
    }

    fn status(&self) -> Status {
        if self.0 == 0 {
            Status::Done
        } else {
            Status::Active
        }
    }
}

#[test]
fn test_custom_pull_source() {
    let functor = Functor::from_source(Countdown(3));
    assert_eq!(functor.map(|x| x * 10).to_vec(), vec![20, 10, 0]);
}
