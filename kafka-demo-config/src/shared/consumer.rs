use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::{OffsetReset, SerializationFormat, ValidationError};

/// Settings of the polling consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConsumerConfig {
    /// Consumer group the worker joins.
    pub group_id: String,
    /// Topic the worker subscribes to.
    pub topic: String,
    #[serde(default)]
    pub offset_reset: OffsetReset,
    #[serde(default)]
    pub key_format: SerializationFormat,
    #[serde(default)]
    pub value_format: SerializationFormat,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    /// Wait budget of a single poll, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Upper bound of records returned by a single poll.
    #[serde(default = "default_max_poll_records")]
    pub max_poll_records: usize,
}

impl ConsumerConfig {
    pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 6_000;

    pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

    pub const DEFAULT_MAX_POLL_RECORDS: usize = 500;

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.group_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("consumer.group_id"));
        }

        if self.topic.trim().is_empty() {
            return Err(ValidationError::EmptyField("consumer.topic"));
        }

        if self.poll_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "consumer.poll_timeout_ms",
                constraint: "must be greater than 0",
            });
        }

        if self.max_poll_records == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "consumer.max_poll_records",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

fn default_session_timeout_ms() -> u64 {
    ConsumerConfig::DEFAULT_SESSION_TIMEOUT_MS
}

fn default_poll_timeout_ms() -> u64 {
    ConsumerConfig::DEFAULT_POLL_TIMEOUT_MS
}

fn default_max_poll_records() -> usize {
    ConsumerConfig::DEFAULT_MAX_POLL_RECORDS
}
