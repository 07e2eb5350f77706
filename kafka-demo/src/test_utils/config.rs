use kafka_demo_config::shared::{
    Acks, BrokerConfig, ConsumerConfig, OffsetReset, ProducerConfig, SerializationFormat,
};

pub const TEST_TOPIC: &str = "first_topic";

pub const TEST_GROUP_ID: &str = "fourth-consumer-group";

pub fn broker_config() -> BrokerConfig {
    BrokerConfig {
        bootstrap_servers: "127.0.0.1:9092".to_string(),
        client_id: None,
        connect_timeout_ms: BrokerConfig::DEFAULT_CONNECT_TIMEOUT_MS,
    }
}

/// Consumer configuration with the default 100 ms wait budget.
pub fn consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        group_id: TEST_GROUP_ID.to_string(),
        topic: TEST_TOPIC.to_string(),
        offset_reset: OffsetReset::Earliest,
        key_format: SerializationFormat::LossyString,
        value_format: SerializationFormat::LossyString,
        session_timeout_ms: ConsumerConfig::DEFAULT_SESSION_TIMEOUT_MS,
        poll_timeout_ms: ConsumerConfig::DEFAULT_POLL_TIMEOUT_MS,
        max_poll_records: ConsumerConfig::DEFAULT_MAX_POLL_RECORDS,
    }
}

pub fn producer_config() -> ProducerConfig {
    ProducerConfig {
        topic: TEST_TOPIC.to_string(),
        acks: Acks::All,
        delivery_timeout_ms: 1_000,
        flush_timeout_ms: 1_000,
        record_count: ProducerConfig::DEFAULT_RECORD_COUNT,
    }
}
