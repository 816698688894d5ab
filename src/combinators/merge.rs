use std::cell::Cell;
use std::rc::Rc;

use crate::stream::{ListenerId, Producer, Stream};

/// Interleave several streams into one.
///
/// Everything already buffered in the sources is moved over immediately,
/// source by source. After that values are appended in the order the sources
/// notify, so ordering is only guaranteed within a single source. The merged
/// stream is done once every source is done and its own buffer is drained.
pub fn merge<T: 'static>(sources: Vec<Stream<T>>) -> Stream<T> {
    let merged = Stream::new(move |emitter| {
        let open = Rc::new(Cell::new(sources.len()));
        let mut listeners: Vec<(Stream<T>, ListenerId)> = Vec::new();
        for source in sources {
            let sink = emitter.clone();
            let closer = emitter.clone();
            let open = Rc::clone(&open);
            let id = source.subscribe(
                move |value| {
                    if let Err(err) = sink.emit(value) {
                        log::trace!("merge: value dropped: {}", err);
                    }
                },
                move || {
                    open.set(open.get() - 1);
                    if open.get() == 0 {
                        log::debug!("merge: all sources done");
                        let _ = closer.stop();
                    }
                },
            );
            if let Some(id) = id {
                listeners.push((source, id));
            }
        }
        if open.get() == 0 {
            let _ = emitter.stop();
        }
        Producer::new().on_stop(move || {
            for (source, id) in listeners {
                source.off(id);
            }
        })
    });
    merged.prime();
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functor::Status;

    #[test]
    fn merge_of_nothing_is_done() {
        let merged: Stream<i32> = merge(Vec::new());
        assert_eq!(merged.status(), Status::Done);
    }

    #[test]
    fn buffered_values_move_over_at_construction() {
        let a = Stream::of(vec![1, 2]);
        let b = Stream::of(vec![3]);
        let merged = merge(vec![a.clone(), b.clone()]);
        assert_eq!(a.pull(), None);
        assert_eq!(merged.pull(), Some(1));
        assert_eq!(merged.pull(), Some(2));
        assert_eq!(merged.pull(), Some(3));
    }
}
