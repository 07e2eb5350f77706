//! Producer binary.
//!
//! Sends the demo batch of keyed records to the configured topic, waiting for every
//! acknowledgment before sending the next record.

use kafka_demo_config::shared::ProducerAppConfig;
use kafka_demo_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_producer_config;
use crate::core::start_producer_with_config;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let producer_config = load_producer_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(producer_config))?;

    Ok(())
}

async fn async_main(producer_config: ProducerAppConfig) -> anyhow::Result<()> {
    if let Err(err) = start_producer_with_config(producer_config).await {
        error!("{err:#}");
        return Err(err);
    }

    Ok(())
}
