//! Background workers.

pub mod base;
pub mod consumer;

pub use consumer::{ConsumerWorker, ConsumerWorkerHandle, ConsumerWorkerState};
