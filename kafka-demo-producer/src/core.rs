use kafka_demo::clients::kafka::KafkaProducerClient;
use kafka_demo::producer::{LoggingDeliveryHandler, ProducerRunner, keyed_records};
use kafka_demo_config::shared::ProducerAppConfig;
use tracing::{info, warn};

pub async fn start_producer_with_config(config: ProducerAppConfig) -> anyhow::Result<()> {
    info!(
        bootstrap_servers = %config.broker.bootstrap_servers,
        topic = %config.producer.topic,
        acks = ?config.producer.acks,
        record_count = config.producer.record_count,
        "producer config"
    );

    let ProducerAppConfig { broker, producer } = config;

    // Connecting blocks on a metadata request.
    let connect_config = producer.clone();
    let client = tokio::task::spawn_blocking(move || {
        KafkaProducerClient::connect(&broker, &connect_config)
    })
    .await??;

    let records = keyed_records(&producer.topic, producer.record_count);
    let summary = ProducerRunner::new(client, &producer)
        .run(records, &mut LoggingDeliveryHandler)
        .await?;

    if summary.failed > 0 {
        warn!(
            delivered = summary.delivered,
            failed = summary.failed,
            "some records were not acknowledged"
        );
    }

    Ok(())
}
