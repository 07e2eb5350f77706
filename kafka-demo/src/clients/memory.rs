use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use kafka_demo_config::shared::{ConsumerConfig, OffsetReset};
use rdkafka::util::current_time_millis;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::bail;
use crate::clients::base::{ConsumerClient, ProducerClient};
use crate::error::{DemoResult, ErrorKind};
use crate::types::{Delivery, Record};

const DEFAULT_PARTITIONS: usize = 3;

#[derive(Debug, Default)]
struct Inner {
    /// Partitions of every topic, each holding its records in offset order.
    topics: HashMap<String, Vec<Vec<Record>>>,
    /// Next offset to read for each `(group, topic)`, per partition.
    committed: HashMap<(String, String), Vec<i64>>,
    next_round_robin: usize,
}

#[derive(Debug, Default)]
struct Counters {
    consumer_closes: AtomicUsize,
    producer_closes: AtomicUsize,
    flushes: AtomicUsize,
}

/// In-process broker for tests and local experiments.
///
/// [`MemoryBroker`] keeps every topic in memory, assigns partitions like the Kafka default
/// partitioner does (hash of the key, round robin for unkeyed records) and tracks the read
/// position of each consumer group. It also counts how often connections were closed and
/// flushed so tests can assert on lifecycle behavior.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    inner: Arc<Mutex<Inner>>,
    appended: Arc<Notify>,
    counters: Arc<Counters>,
    reachable: Arc<AtomicBool>,
    partitions: usize,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    /// Creates a broker whose topics all have `partitions` partitions.
    pub fn with_partitions(partitions: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            appended: Arc::new(Notify::new()),
            counters: Arc::new(Counters::default()),
            reachable: Arc::new(AtomicBool::new(true)),
            partitions: partitions.max(1),
        }
    }

    /// Makes subsequent connection attempts fail with [`ErrorKind::ConnectFailed`].
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Connects a consumer to this broker.
    pub fn consumer(&self, config: &ConsumerConfig) -> DemoResult<MemoryConsumer> {
        self.check_reachable()?;

        Ok(MemoryConsumer {
            broker: self.clone(),
            group_id: config.group_id.clone(),
            offset_reset: config.offset_reset,
            max_poll_records: config.max_poll_records,
            topic: None,
            closed: false,
        })
    }

    /// Connects a producer to this broker.
    pub fn producer(&self) -> DemoResult<MemoryProducer> {
        self.check_reachable()?;

        Ok(MemoryProducer {
            broker: self.clone(),
            closed: false,
        })
    }

    fn check_reachable(&self) -> DemoResult<()> {
        if !self.reachable.load(Ordering::SeqCst) {
            bail!(ErrorKind::ConnectFailed, "Memory broker is not reachable");
        }

        Ok(())
    }

    /// Appends a record to its topic and wakes up waiting consumers.
    pub async fn append(&self, record: Record) -> Delivery {
        let mut inner = self.inner.lock().await;

        let partition = match &record.key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % self.partitions as u64) as usize
            }
            None => {
                let partition = inner.next_round_robin % self.partitions;
                inner.next_round_robin += 1;
                partition
            }
        };

        let partitions = self.partitions;
        let log = &mut inner
            .topics
            .entry(record.topic.clone())
            .or_insert_with(|| vec![Vec::new(); partitions])[partition];

        let delivery = Delivery {
            partition: partition as i32,
            offset: log.len() as i64,
            timestamp: Some(current_time_millis()),
        };
        log.push(record.with_delivery(delivery));
        drop(inner);

        self.appended.notify_waiters();

        delivery
    }

    /// Returns every record of `topic`, ordered by partition and offset.
    pub async fn records(&self, topic: &str) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub fn consumer_closes(&self) -> usize {
        self.counters.consumer_closes.load(Ordering::SeqCst)
    }

    pub fn producer_closes(&self) -> usize {
        self.counters.producer_closes.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.counters.flushes.load(Ordering::SeqCst)
    }

    /// Returns up to `max_records` unread records of `topic` for `group_id` and commits the
    /// new position before releasing the lock.
    async fn fetch(
        &self,
        group_id: &str,
        topic: &str,
        offset_reset: OffsetReset,
        max_records: usize,
    ) -> Vec<Record> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let partitions = self.partitions;

        let logs = inner
            .topics
            .entry(topic.to_owned())
            .or_insert_with(|| vec![Vec::new(); partitions]);
        let positions = inner
            .committed
            .entry((group_id.to_owned(), topic.to_owned()))
            .or_insert_with(|| match offset_reset {
                OffsetReset::Earliest => vec![0; partitions],
                OffsetReset::Latest => logs.iter().map(|log| log.len() as i64).collect(),
            });

        let mut records = Vec::new();
        for (log, position) in logs.iter().zip(positions.iter_mut()) {
            let start = *position as usize;
            let available = log.len().saturating_sub(start);
            let take = available.min(max_records - records.len());

            records.extend_from_slice(&log[start..start + take]);
            *position += take as i64;

            if records.len() == max_records {
                break;
            }
        }

        records
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer connected to a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryConsumer {
    broker: MemoryBroker,
    group_id: String,
    offset_reset: OffsetReset,
    max_poll_records: usize,
    topic: Option<String>,
    closed: bool,
}

impl ConsumerClient for MemoryConsumer {
    fn subscribe(&mut self, topic: &str) -> DemoResult<()> {
        if self.closed {
            bail!(ErrorKind::SubscribeFailed, "Memory consumer is closed", topic);
        }

        self.topic = Some(topic.to_owned());
        debug!(topic, group_id = %self.group_id, "subscribed memory consumer");

        Ok(())
    }

    async fn poll(&mut self, max_wait: Duration) -> DemoResult<Vec<Record>> {
        if self.closed {
            bail!(ErrorKind::InvalidState, "Memory consumer is closed");
        }
        let Some(topic) = self.topic.as_deref() else {
            bail!(ErrorKind::InvalidState, "Memory consumer is not subscribed");
        };

        let deadline = Instant::now() + max_wait;
        loop {
            // Register interest before looking at the log so an append in between is not
            // missed.
            let appended = self.broker.appended.notified();

            let records = self
                .broker
                .fetch(&self.group_id, topic, self.offset_reset, self.max_poll_records)
                .await;
            if !records.is_empty() {
                return Ok(records);
            }

            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(records);
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        self.broker
            .counters
            .consumer_closes
            .fetch_add(1, Ordering::SeqCst);

        info!(group_id = %self.group_id, "closed memory consumer");
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Producer connected to a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryProducer {
    broker: MemoryBroker,
    closed: bool,
}

impl ProducerClient for MemoryProducer {
    async fn send(&self, record: &Record, _timeout: Duration) -> DemoResult<Delivery> {
        if self.closed {
            bail!(ErrorKind::InvalidState, "Memory producer is closed");
        }

        Ok(self.broker.append(record.clone()).await)
    }

    async fn flush(&self, _timeout: Duration) -> DemoResult<()> {
        if self.closed {
            bail!(ErrorKind::InvalidState, "Memory producer is closed");
        }

        self.broker.counters.flushes.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        self.broker
            .counters
            .producer_closes
            .fetch_add(1, Ordering::SeqCst);

        info!("closed memory producer");
    }
}
