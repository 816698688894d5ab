//! Lazy pull-based sequences and push-capable streams.
//!
//! [`Functor`] is a read-only lazy sequence with a single `pull` primitive.
//! [`Stream`] adds a producer: values can be pushed, the stream can be
//! started and stopped, and consumers are notified when something new is
//! ready. Every operator in [`SequenceExt`] works on both.
//!
//! Streams are single-threaded. Anything that waits goes through a
//! [`timing::Scheduler`]: tokio's `LocalSet` when a runtime is entered,
//! otherwise a queue drained as pulls return.

pub mod error;
pub mod stream_configuration;

pub mod combinators;
pub mod functor;
pub mod stream;
pub mod timing;

pub use combinators::{combine, merge, Choke, Throttle};
pub use error::{StreamError, StreamResult};
pub use functor::{BoxPull, Functor, Pull, Sequence, SequenceExt, Status, Step};
pub use stream::{Emitter, ListenerId, Phase, Producer, Stream, WeakStream};
pub use stream_configuration::{BufferConfig, StreamConfig, TimingConfig};
pub use timing::{ManualScheduler, Scheduler, Timer, TokioScheduler};

pub mod prelude {
    pub use crate::combinators::{combine, merge, Choke, Throttle};
    pub use crate::error::{StreamError, StreamResult};
    pub use crate::functor::{Functor, Pull, Sequence, SequenceExt, Status, Step};
    pub use crate::stream::{Emitter, Phase, Producer, Stream};
    pub use crate::timing::Timer;
}
