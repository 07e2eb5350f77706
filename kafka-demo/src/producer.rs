//! Synchronous keyed producer.
//!
//! [`ProducerRunner`] sends a batch of records one at a time and waits for the broker to
//! acknowledge each of them before submitting the next one. Every outcome is reported to a
//! [`DeliveryHandler`], failed records do not stop the batch.

use std::time::Duration;

use kafka_demo_config::shared::ProducerConfig;
use tracing::{error, info};

use crate::clients::ProducerClient;
use crate::error::{DemoError, DemoResult};
use crate::types::{DisplayOption, Record};

/// Receives the outcome of every record sent by a [`ProducerRunner`].
///
/// On success `delivered` is the sent record with its broker position filled in, so the
/// handler can correlate the acknowledgment with the original key.
pub trait DeliveryHandler {
    fn on_delivery(&mut self, record: &Record, result: Result<&Record, &DemoError>);
}

impl<F> DeliveryHandler for F
where
    F: FnMut(&Record, Result<&Record, &DemoError>),
{
    fn on_delivery(&mut self, record: &Record, result: Result<&Record, &DemoError>) {
        self(record, result)
    }
}

/// Handler that logs where each record was stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDeliveryHandler;

impl DeliveryHandler for LoggingDeliveryHandler {
    fn on_delivery(&mut self, record: &Record, result: Result<&Record, &DemoError>) {
        match result {
            Ok(delivered) => info!(
                "Received new metadata. Key: {}, Topic: {}, Partition: {}, Offset: {}, Timestamp: {}",
                record.key_str(),
                delivered.topic,
                DisplayOption(delivered.partition),
                DisplayOption(delivered.offset),
                DisplayOption(delivered.timestamp)
            ),
            Err(err) => error!(key = record.key_str(), error = %err, "error while producing"),
        }
    }
}

/// Counts of the outcomes of a [`ProducerRunner::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends records through a [`ProducerClient`], awaiting each acknowledgment.
#[derive(Debug)]
pub struct ProducerRunner<P> {
    client: P,
    delivery_timeout: Duration,
    flush_timeout: Duration,
}

impl<P> ProducerRunner<P>
where
    P: ProducerClient,
{
    pub fn new(client: P, config: &ProducerConfig) -> Self {
        Self {
            client,
            delivery_timeout: config.delivery_timeout(),
            flush_timeout: config.flush_timeout(),
        }
    }

    /// Sends `records` strictly in order, then flushes and closes the client.
    ///
    /// Flush and close run even when sends failed. The only error returned is a failed
    /// flush; individual send failures are reported to `handler` and counted in the
    /// summary.
    pub async fn run<H>(
        mut self,
        records: impl IntoIterator<Item = Record>,
        handler: &mut H,
    ) -> DemoResult<ProducerSummary>
    where
        H: DeliveryHandler + ?Sized,
    {
        let mut summary = ProducerSummary::default();

        for record in records {
            info!("Key: {}", record.key_str());

            match self.client.send(&record, self.delivery_timeout).await {
                Ok(delivery) => {
                    let delivered = record.clone().with_delivery(delivery);
                    handler.on_delivery(&record, Ok(&delivered));
                    summary.delivered += 1;
                }
                Err(err) => {
                    handler.on_delivery(&record, Err(&err));
                    summary.failed += 1;
                }
            }
        }

        let flushed = self.client.flush(self.flush_timeout).await;
        self.client.close();

        info!(
            delivered = summary.delivered,
            failed = summary.failed,
            "producer finished"
        );

        flushed.map(|_| summary)
    }
}

/// Builds `count` records keyed `id_1..id_count` with values `Hello world 1..count`.
pub fn keyed_records(topic: &str, count: usize) -> Vec<Record> {
    (1..=count)
        .map(|i| Record::keyed(topic, format!("id_{i}"), format!("Hello world {i}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;
    use crate::clients::memory::MemoryBroker;
    use crate::test_utils::config::{TEST_TOPIC, producer_config};
    use crate::test_utils::producer::FaultyProducer;

    /// Counts events at `WARN` level or above.
    struct ProblemCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for ProblemCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_record_is_reported_once() {
        let problems = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ProblemCounter(problems.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let broker = MemoryBroker::new();
        let producer = FaultyProducer::wrap(broker.producer().unwrap()).fail_key("id_2");
        let runner = ProducerRunner::new(producer, &producer_config());

        let summary = runner
            .run(keyed_records(TEST_TOPIC, 3), &mut LoggingDeliveryHandler)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(problems.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn keyed_records_follow_the_demo_naming() {
        let records = keyed_records("first_topic", 10);

        assert_eq!(records.len(), 10);
        assert_eq!(records[0].key_str(), "id_1");
        assert_eq!(records[0].value, "Hello world 1");
        assert_eq!(records[9].key_str(), "id_10");
        assert_eq!(records[9].value, "Hello world 10");
        assert!(records.iter().all(|record| record.topic == "first_topic"));
        assert!(records.iter().all(|record| record.offset.is_none()));
    }

    #[test]
    fn keyed_records_can_be_empty() {
        assert!(keyed_records("first_topic", 0).is_empty());
    }
}
