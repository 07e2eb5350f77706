use kafka_demo_config::load_config;
use kafka_demo_config::shared::ConsumerAppConfig;

/// Loads and validates the consumer configuration.
pub fn load_consumer_config() -> anyhow::Result<ConsumerAppConfig> {
    let config = load_config::<ConsumerAppConfig>()?;
    config.validate()?;

    Ok(config)
}
