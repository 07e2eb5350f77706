//! Coordination primitives between the consumer worker and whoever controls its lifetime.
//!
//! - [`shutdown`] is the cancellation token: set once by the coordinator, observed by the
//!   worker while it is blocked in a poll.
//! - [`signal`] is the completion signal: fired once by the worker after its connection has
//!   been released, awaited by any number of waiters.

pub mod shutdown;
pub mod signal;
