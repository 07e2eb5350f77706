use serde::Deserialize;

use crate::shared::{BrokerConfig, ConsumerConfig, ProducerConfig, ValidationError};

/// Complete configuration of the consumer binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerAppConfig {
    pub broker: BrokerConfig,
    pub consumer: ConsumerConfig,
}

impl ConsumerAppConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.broker.validate()?;
        self.consumer.validate()
    }
}

/// Complete configuration of the producer binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerAppConfig {
    pub broker: BrokerConfig,
    pub producer: ProducerConfig,
}

impl ProducerAppConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.broker.validate()?;
        self.producer.validate()
    }
}
