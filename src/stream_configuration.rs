//! Configuration types for streams and schedulers

use std::time::Duration;

use crate::timing::{ManualScheduler, TokioScheduler};

/// Buffer configuration for push-capable streams
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Slots reserved in the root buffer when the stream is created
    pub initial_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
        }
    }
}

impl BufferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of slots reserved up front
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

/// Timing configuration shared by the schedulers
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Cadence of `request_frame` and `Timer::frame`
    pub frame: Duration,
    /// Maximum number of queued ticks a manual scheduler runs per step.
    /// Guards against tick callbacks that keep re-queueing themselves.
    pub tick_batch: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame: Duration::from_micros(16_667), // ~60 frames per second
            tick_batch: 10_000,
        }
    }
}

impl TimingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame cadence
    pub fn frame(mut self, frame: Duration) -> Self {
        self.frame = frame;
        self
    }

    /// Set the tick batch limit
    pub fn tick_batch(mut self, tick_batch: usize) -> Self {
        self.tick_batch = tick_batch;
        self
    }
}

/// Aggregate configuration.
///
/// `buffer` applies per stream through
/// [`Stream::with_config`](crate::Stream::with_config). `timing` applies per
/// thread, through the scheduler built with [`manual_scheduler`](Self::manual_scheduler)
/// or [`tokio_scheduler`](Self::tokio_scheduler) and installed with
/// [`timing::set_default`](crate::timing::set_default).
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    pub buffer: BufferConfig,
    pub timing: TimingConfig,
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// A virtual-clock scheduler using this timing
    pub fn manual_scheduler(&self) -> ManualScheduler {
        ManualScheduler::with_config(self.timing.clone())
    }

    /// A tokio scheduler using this timing
    pub fn tokio_scheduler(&self) -> TokioScheduler {
        TokioScheduler::with_config(self.timing.clone())
    }
}
