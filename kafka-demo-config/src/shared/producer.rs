use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::{Acks, ValidationError};

/// Settings of the synchronous producer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProducerConfig {
    /// Topic the demo batch is published to.
    pub topic: String,
    #[serde(default)]
    pub acks: Acks,
    /// Maximum time, in milliseconds, to wait for the acknowledgment of one record.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Maximum time, in milliseconds, the final flush may block.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    /// Number of keyed records produced by one run.
    #[serde(default = "default_record_count")]
    pub record_count: usize,
}

impl ProducerConfig {
    pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 30_000;

    pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 10_000;

    pub const DEFAULT_RECORD_COUNT: usize = 10;

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.topic.trim().is_empty() {
            return Err(ValidationError::EmptyField("producer.topic"));
        }

        if self.delivery_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "producer.delivery_timeout_ms",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

fn default_delivery_timeout_ms() -> u64 {
    ProducerConfig::DEFAULT_DELIVERY_TIMEOUT_MS
}

fn default_flush_timeout_ms() -> u64 {
    ProducerConfig::DEFAULT_FLUSH_TIMEOUT_MS
}

fn default_record_count() -> usize {
    ProducerConfig::DEFAULT_RECORD_COUNT
}
