use kafka_demo_config::load_config;
use kafka_demo_config::shared::ProducerAppConfig;

/// Loads and validates the producer configuration.
pub fn load_producer_config() -> anyhow::Result<ProducerAppConfig> {
    let config = load_config::<ProducerAppConfig>()?;
    config.validate()?;

    Ok(config)
}
