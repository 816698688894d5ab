use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::{StreamError, StreamResult};
use crate::stream::{ListenerId, Producer, Stream};

/// Fewest sources `combine` accepts
const MIN_SOURCES: usize = 2;

/// Combine the latest value of every source with `f`.
///
/// Nothing is emitted until each source has produced at least one value.
/// From then on every new value from any source emits `f` over the current
/// latest values, in source order. Done once every source is done.
pub fn combine<T, U, F>(sources: Vec<Stream<T>>, f: F) -> StreamResult<Stream<U>>
where
    T: Clone + 'static,
    U: 'static,
    F: FnMut(&[T]) -> U + 'static,
{
    if sources.len() < MIN_SOURCES {
        return Err(StreamError::CombinatorArity {
            required: MIN_SOURCES,
            given: sources.len(),
        });
    }
    let combined = Stream::new(move |emitter| {
        let slots: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; sources.len()]));
        let f = Rc::new(RefCell::new(f));
        let open = Rc::new(Cell::new(sources.len()));
        let mut listeners: Vec<(Stream<T>, ListenerId)> = Vec::new();
        for (index, source) in sources.into_iter().enumerate() {
            let slots = Rc::clone(&slots);
            let f = Rc::clone(&f);
            let sink = emitter.clone();
            let closer = emitter.clone();
            let open = Rc::clone(&open);
            let id = source.subscribe(
                move |value| {
                    let latest: Option<Vec<T>> = {
                        let mut slots = slots.borrow_mut();
                        slots[index] = Some(value);
                        slots.iter().cloned().collect()
                    };
                    if let Some(latest) = latest {
                        let output = (&mut *f.borrow_mut())(&latest);
                        if let Err(err) = sink.emit(output) {
                            log::trace!("combine: value dropped: {}", err);
                        }
                    }
                },
                move || {
                    open.set(open.get() - 1);
                    if open.get() == 0 {
                        log::debug!("combine: all sources done");
                        let _ = closer.stop();
                    }
                },
            );
            if let Some(id) = id {
                listeners.push((source, id));
            }
        }
        Producer::new().on_stop(move || {
            for (source, id) in listeners {
                source.off(id);
            }
        })
    });
    combined.prime();
    Ok(combined)
}
