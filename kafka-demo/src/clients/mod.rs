//! Broker clients used by the consumer worker and the producer runner.
//!
//! [`base`] defines the narrow interface the rest of the crate relies on, [`kafka`]
//! implements it on top of librdkafka and [`memory`] provides an in-process broker.

pub mod base;
pub mod kafka;
pub mod memory;

pub use base::{ConsumerClient, ProducerClient};
