//! Utilities for testing the consumer worker, the producer runner and the coordinator
//! without a Kafka cluster.
//!
//! - [`config`] builds configurations pointing at the demo topic and group
//! - [`consumer`] provides a consumer whose poll results are scripted
//! - [`producer`] wraps the in-memory producer and injects failures for chosen keys
//! - [`handler`] records every delivery callback
//! - [`notify`] waits for notifications with a timeout so tests fail instead of hanging

pub mod config;
pub mod consumer;
pub mod handler;
pub mod notify;
pub mod producer;
