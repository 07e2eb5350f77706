//! Consumer binary.
//!
//! Polls the configured topic on a background worker, logs every record and shuts down
//! gracefully on Ctrl+C or SIGTERM.

use kafka_demo_config::shared::ConsumerAppConfig;
use kafka_demo_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_consumer_config;
use crate::core::start_consumer_with_config;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let consumer_config = load_consumer_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(consumer_config))?;

    Ok(())
}

async fn async_main(consumer_config: ConsumerAppConfig) -> anyhow::Result<()> {
    if let Err(err) = start_consumer_with_config(consumer_config).await {
        error!("{err:#}");
        return Err(err);
    }

    Ok(())
}
