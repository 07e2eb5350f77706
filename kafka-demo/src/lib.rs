//! Cancellable polling consumer and synchronous keyed producer built on top of a Kafka client.
//!
//! The broker itself, its wire protocol and consumer group management are provided by
//! librdkafka through [`rdkafka`]. This crate owns the lifecycle around it: the consumer
//! worker that polls until it is told to stop, the coordinator that turns process signals
//! into a graceful shutdown, and the producer runner that awaits every acknowledgment.

pub mod clients;
pub mod concurrency;
pub mod coordinator;
pub mod error;
mod macros;
pub mod producer;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
