use std::time::Duration;

use futures::FutureExt;
use kafka_demo_config::shared::{BrokerConfig, ConsumerConfig, ProducerConfig, SerializationFormat};
use rdkafka::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::{Timeout, current_time_millis};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use crate::clients::base::{ConsumerClient, ProducerClient, decode_field};
use crate::demo_error;
use crate::error::{DemoResult, ErrorKind};
use crate::types::{Delivery, Record};

fn base_client_config(broker: &BrokerConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config.set("bootstrap.servers", &broker.bootstrap_servers);
    if let Some(client_id) = &broker.client_id {
        client_config.set("client.id", client_id);
    }

    client_config
}

fn consumer_client_config(broker: &BrokerConfig, consumer: &ConsumerConfig) -> ClientConfig {
    let mut client_config = base_client_config(broker);
    client_config
        .set("group.id", &consumer.group_id)
        .set("auto.offset.reset", consumer.offset_reset.as_client_value())
        .set("session.timeout.ms", consumer.session_timeout_ms.to_string())
        .set("enable.partition.eof", "false");

    client_config
}

fn producer_client_config(broker: &BrokerConfig, producer: &ProducerConfig) -> ClientConfig {
    let mut client_config = base_client_config(broker);
    client_config
        .set("acks", producer.acks.as_client_value())
        .set("message.timeout.ms", producer.delivery_timeout_ms.to_string());

    client_config
}

/// Consumer backed by an rdkafka [`StreamConsumer`].
pub struct KafkaConsumerClient {
    consumer: Option<StreamConsumer>,
    key_format: SerializationFormat,
    value_format: SerializationFormat,
    max_poll_records: usize,
}

impl KafkaConsumerClient {
    /// Creates the consumer and checks that the cluster answers a metadata request within
    /// the configured connect timeout.
    ///
    /// The metadata request blocks the calling thread.
    pub fn connect(broker: &BrokerConfig, config: &ConsumerConfig) -> DemoResult<Self> {
        let consumer: StreamConsumer = consumer_client_config(broker, config)
            .create()
            .map_err(|err| {
                demo_error!(
                    ErrorKind::ConnectFailed,
                    "Kafka consumer could not be created",
                    source: err
                )
            })?;

        consumer
            .fetch_metadata(None, broker.connect_timeout())
            .map_err(|err| {
                demo_error!(
                    ErrorKind::ConnectFailed,
                    "Kafka cluster is not reachable",
                    broker.bootstrap_servers.clone(),
                    source: err
                )
            })?;

        info!(
            bootstrap_servers = %broker.bootstrap_servers,
            group_id = %config.group_id,
            "connected kafka consumer"
        );

        Ok(Self {
            consumer: Some(consumer),
            key_format: config.key_format,
            value_format: config.value_format,
            max_poll_records: config.max_poll_records,
        })
    }

    fn consumer(&self) -> DemoResult<&StreamConsumer> {
        self.consumer.as_ref().ok_or_else(|| {
            demo_error!(ErrorKind::InvalidState, "Kafka consumer is already closed")
        })
    }

    /// Converts a fetched message, skipping it when its key or value cannot be decoded.
    fn push_message(&self, records: &mut Vec<Record>, message: &BorrowedMessage<'_>) {
        match to_record(message, self.key_format, self.value_format) {
            Ok(record) => records.push(record),
            Err(err) => warn!(
                partition = message.partition(),
                offset = message.offset(),
                error = %err,
                "skipping record that could not be decoded"
            ),
        }
    }
}

fn to_record<M: Message>(
    message: &M,
    key_format: SerializationFormat,
    value_format: SerializationFormat,
) -> DemoResult<Record> {
    let key = message
        .key()
        .map(|key| decode_field(key, key_format, "key"))
        .transpose()?;
    let value = match message.payload() {
        Some(payload) => decode_field(payload, value_format, "value")?,
        None => String::new(),
    };

    Ok(Record {
        topic: message.topic().to_owned(),
        key,
        value,
        partition: Some(message.partition()),
        offset: Some(message.offset()),
        timestamp: message.timestamp().to_millis(),
    })
}

impl ConsumerClient for KafkaConsumerClient {
    fn subscribe(&mut self, topic: &str) -> DemoResult<()> {
        self.consumer()?.subscribe(&[topic]).map_err(|err| {
            demo_error!(
                ErrorKind::SubscribeFailed,
                "Kafka consumer could not subscribe",
                topic,
                source: err
            )
        })?;

        info!(topic, "subscribed kafka consumer");

        Ok(())
    }

    async fn poll(&mut self, max_wait: Duration) -> DemoResult<Vec<Record>> {
        let consumer = self.consumer()?;
        let mut records = Vec::new();

        // `recv` only removes a message from the queue when it resolves, so dropping this
        // future on timeout or cancellation loses nothing.
        match tokio::time::timeout(max_wait, consumer.recv()).await {
            Err(_) => return Ok(records),
            Ok(Err(err)) => {
                return Err(demo_error!(
                    ErrorKind::PollFailed,
                    "Kafka consumer poll failed",
                    source: err
                ));
            }
            Ok(Ok(message)) => self.push_message(&mut records, &message),
        }

        // Drain whatever is already buffered without waiting again.
        while records.len() < self.max_poll_records {
            match consumer.recv().now_or_never() {
                Some(Ok(message)) => self.push_message(&mut records, &message),
                Some(Err(err)) => {
                    warn!(error = %err, "kafka consumer error while draining a batch");
                    break;
                }
                None => break,
            }
        }

        Ok(records)
    }

    fn close(&mut self) {
        let Some(consumer) = self.consumer.take() else {
            return;
        };

        consumer.unsubscribe();
        release_consumer(consumer);

        info!("closed kafka consumer");
    }

    fn is_closed(&self) -> bool {
        self.consumer.is_none()
    }
}

/// Drops `consumer`, which blocks until it left its consumer group.
///
/// On a multi-thread runtime the worker thread is handed over to the blocking pool for the
/// duration of the drop. `block_in_place` is not available on a current-thread runtime, where
/// the drop blocks the runtime instead.
fn release_consumer(consumer: StreamConsumer) {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(move || drop(consumer)),
        _ => drop(consumer),
    }
}

/// Producer backed by an rdkafka [`FutureProducer`].
pub struct KafkaProducerClient {
    producer: Option<FutureProducer>,
}

impl KafkaProducerClient {
    /// Creates the producer and checks that the cluster answers a metadata request within
    /// the configured connect timeout.
    ///
    /// The metadata request blocks the calling thread.
    pub fn connect(broker: &BrokerConfig, config: &ProducerConfig) -> DemoResult<Self> {
        let producer: FutureProducer = producer_client_config(broker, config)
            .create()
            .map_err(|err| {
                demo_error!(
                    ErrorKind::ConnectFailed,
                    "Kafka producer could not be created",
                    source: err
                )
            })?;

        producer
            .client()
            .fetch_metadata(None, broker.connect_timeout())
            .map_err(|err| {
                demo_error!(
                    ErrorKind::ConnectFailed,
                    "Kafka cluster is not reachable",
                    broker.bootstrap_servers.clone(),
                    source: err
                )
            })?;

        info!(bootstrap_servers = %broker.bootstrap_servers, "connected kafka producer");

        Ok(Self {
            producer: Some(producer),
        })
    }

    fn producer(&self) -> DemoResult<&FutureProducer> {
        self.producer.as_ref().ok_or_else(|| {
            demo_error!(ErrorKind::InvalidState, "Kafka producer is already closed")
        })
    }
}

impl ProducerClient for KafkaProducerClient {
    async fn send(&self, record: &Record, timeout: Duration) -> DemoResult<Delivery> {
        let producer = self.producer()?;

        let timestamp = current_time_millis();
        let mut future_record = FutureRecord::<str, str>::to(&record.topic)
            .payload(record.value.as_str())
            .timestamp(timestamp);
        if let Some(key) = &record.key {
            future_record = future_record.key(key.as_str());
        }

        match producer.send(future_record, Timeout::After(timeout)).await {
            Ok((partition, offset)) => Ok(Delivery {
                partition,
                offset,
                timestamp: Some(timestamp),
            }),
            Err((err, _message)) => Err(demo_error!(
                ErrorKind::SendFailed,
                "Kafka broker did not acknowledge the record",
                record.key_str(),
                source: err
            )),
        }
    }

    async fn flush(&self, timeout: Duration) -> DemoResult<()> {
        let producer = self.producer()?.clone();

        // `Producer::flush` blocks until the queue is empty or the timeout elapses.
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|err| {
                demo_error!(
                    ErrorKind::FlushFailed,
                    "Kafka producer flush task failed",
                    source: err
                )
            })?
            .map_err(|err| {
                demo_error!(
                    ErrorKind::FlushFailed,
                    "Kafka producer could not flush buffered records",
                    source: err
                )
            })?;

        debug!("flushed kafka producer");

        Ok(())
    }

    fn close(&mut self) {
        if self.producer.take().is_some() {
            info!("closed kafka producer");
        }
    }
}
