use anyhow::Context;
use kafka_demo::clients::kafka::KafkaConsumerClient;
use kafka_demo::coordinator::{ConsumerApp, install_shutdown_handler};
use kafka_demo_config::shared::ConsumerAppConfig;
use tracing::info;

pub async fn start_consumer_with_config(config: ConsumerAppConfig) -> anyhow::Result<()> {
    log_config(&config);

    let ConsumerAppConfig { broker, consumer } = config;

    // Connecting blocks on a metadata request.
    let connect_config = consumer.clone();
    let client = tokio::task::spawn_blocking(move || {
        KafkaConsumerClient::connect(&broker, &connect_config)
    })
    .await??;

    let mut app = ConsumerApp::new(client, &consumer)?;
    app.start().await?;

    start_app(app).await
}

fn log_config(config: &ConsumerAppConfig) {
    info!(
        bootstrap_servers = %config.broker.bootstrap_servers,
        group_id = %config.consumer.group_id,
        topic = %config.consumer.topic,
        offset_reset = ?config.consumer.offset_reset,
        poll_timeout_ms = config.consumer.poll_timeout_ms,
        "consumer config"
    );
}

/// Waits for the started app while a separate task turns process signals into a shutdown.
#[tracing::instrument(skip(app))]
async fn start_app(app: ConsumerApp<KafkaConsumerClient>) -> anyhow::Result<()> {
    let shutdown_tx = app.shutdown_tx();
    let completion = app
        .completion()
        .context("consumer app has no completion signal after starting")?;
    let shutdown_handle = install_shutdown_handler(shutdown_tx.clone(), completion);

    let result = app.wait().await;

    // A worker that stopped on its own leaves the handler waiting for a signal that will
    // never come.
    if shutdown_tx.is_shutdown() {
        let _ = shutdown_handle.await;
    } else {
        shutdown_handle.abort();
        let _ = shutdown_handle.await;
    }

    result?;

    Ok(())
}
