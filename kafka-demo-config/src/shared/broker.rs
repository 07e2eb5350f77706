use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Connection settings shared by producers and consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BrokerConfig {
    /// Comma separated `host:port` list used to bootstrap the client.
    pub bootstrap_servers: String,
    /// Client id reported to the broker, librdkafka picks one when unset.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Budget, in milliseconds, for the reachability probe performed when connecting.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl BrokerConfig {
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bootstrap_servers.trim().is_empty() {
            return Err(ValidationError::EmptyField("broker.bootstrap_servers"));
        }

        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "broker.connect_timeout_ms",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

fn default_connect_timeout_ms() -> u64 {
    BrokerConfig::DEFAULT_CONNECT_TIMEOUT_MS
}
