//! Operators over several streams, and time-based operators
//!
//! [`merge`] and [`combine`] join independent sources; [`Throttle`] and
//! [`Choke`] shape a single source in time using the [`timing`](crate::timing)
//! schedulers.

pub mod choke;
pub mod combine;
pub mod merge;
pub mod throttle;

pub use choke::Choke;
pub use combine::combine;
pub use merge::merge;
pub use throttle::Throttle;
