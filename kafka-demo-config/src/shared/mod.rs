//! Shared configuration types for the demo binaries.

mod app;
mod base;
mod broker;
mod consumer;
mod formats;
mod producer;

pub use app::{ConsumerAppConfig, ProducerAppConfig};
pub use base::ValidationError;
pub use broker::BrokerConfig;
pub use consumer::ConsumerConfig;
pub use formats::{Acks, OffsetReset, SerializationFormat};
pub use producer::ProducerConfig;
