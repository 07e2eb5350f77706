use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use kafka_demo_config::shared::ConsumerConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, warn};

use crate::clients::ConsumerClient;
use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, wait_for_shutdown};
use crate::concurrency::signal::{CompletionRx, CompletionTx, create_completion_signal};
use crate::demo_error;
use crate::error::{DemoResult, ErrorKind};
use crate::types::{DisplayOption, Record};
use crate::workers::base::{Worker, WorkerHandle};

/// Lifecycle of a [`ConsumerWorker`].
///
/// The worker moves `Created → Subscribed → Polling ⇄ ProcessingBatch → Cancelled → Closed`.
/// A worker that stops because of an unexpected failure skips `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerWorkerState {
    Created,
    Subscribed,
    Polling,
    ProcessingBatch,
    Cancelled,
    Closed,
}

/// Result of a single poll raced against the cancellation token.
#[derive(Debug)]
pub enum PollOutcome {
    Records(Vec<Record>),
    /// Shutdown was requested before or while polling.
    Cancelled,
}

/// Polls `client` once, returning early with [`PollOutcome::Cancelled`] when shutdown is
/// requested.
///
/// Shutdown takes priority: a token that is already set wins over records that are ready.
pub async fn poll_once<C>(
    client: &mut C,
    max_wait: Duration,
    shutdown_rx: &mut ShutdownRx,
) -> DemoResult<PollOutcome>
where
    C: ConsumerClient,
{
    tokio::select! {
        biased;

        _ = wait_for_shutdown(shutdown_rx) => Ok(PollOutcome::Cancelled),
        result = client.poll(max_wait) => result.map(PollOutcome::Records),
    }
}

/// Handle for a running [`ConsumerWorker`].
#[derive(Debug)]
pub struct ConsumerWorkerHandle {
    state_rx: watch::Receiver<ConsumerWorkerState>,
    shutdown_tx: ShutdownTx,
    completion_rx: CompletionRx,
    records_processed: Arc<AtomicUsize>,
    handle: Option<JoinHandle<DemoResult<()>>>,
}

impl ConsumerWorkerHandle {
    /// Requests the worker to stop without waiting for it.
    ///
    /// Can be called any number of times from any thread.
    pub fn shutdown(&self) {
        if self.shutdown_tx.shutdown() {
            info!("requested consumer worker shutdown");
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Returns a receiver that resolves once the worker closed its connection.
    pub fn completion(&self) -> CompletionRx {
        self.completion_rx.clone()
    }

    pub fn records_processed(&self) -> usize {
        self.records_processed.load(Ordering::SeqCst)
    }
}

impl WorkerHandle<ConsumerWorkerState> for ConsumerWorkerHandle {
    fn state(&self) -> ConsumerWorkerState {
        *self.state_rx.borrow()
    }

    async fn wait(mut self) -> DemoResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            if err.is_cancelled() {
                demo_error!(
                    ErrorKind::ConsumerWorkerCancelled,
                    "Consumer worker was cancelled",
                    err
                )
            } else {
                demo_error!(
                    ErrorKind::ConsumerWorkerPanic,
                    "Consumer worker panicked",
                    err
                )
            }
        })??;

        Ok(())
    }
}

/// Worker that polls a topic until shutdown is requested and logs every record it receives.
///
/// The worker exclusively owns its client. Whatever makes the loop stop (cancellation, an
/// unexpected error or a panic) the client is closed first and the completion signal fires
/// afterwards, exactly once.
#[derive(Debug)]
pub struct ConsumerWorker<C> {
    client: C,
    topic: String,
    group_id: String,
    poll_timeout: Duration,
    shutdown_tx: ShutdownTx,
    state_tx: watch::Sender<ConsumerWorkerState>,
}

impl<C> ConsumerWorker<C>
where
    C: ConsumerClient,
{
    /// Subscribes `client` to the configured topic.
    ///
    /// A failed subscription is fatal: the client is closed and the error returned.
    pub fn new(
        mut client: C,
        config: &ConsumerConfig,
        shutdown_tx: ShutdownTx,
    ) -> DemoResult<Self> {
        let (state_tx, _) = watch::channel(ConsumerWorkerState::Created);

        if let Err(err) = client.subscribe(&config.topic) {
            error!(topic = %config.topic, error = %err, "consumer worker could not subscribe");
            client.close();

            return Err(err);
        }
        state_tx.send_replace(ConsumerWorkerState::Subscribed);

        Ok(Self {
            client,
            topic: config.topic.clone(),
            group_id: config.group_id.clone(),
            poll_timeout: config.poll_timeout(),
            shutdown_tx,
            state_tx,
        })
    }
}

impl<C> Worker<ConsumerWorkerHandle, ConsumerWorkerState> for ConsumerWorker<C>
where
    C: ConsumerClient + Send + 'static,
{
    /// Spawning the task cannot fail, every failure is reported through the handle.
    type Error = Infallible;

    async fn start(self) -> Result<ConsumerWorkerHandle, Infallible> {
        info!(topic = %self.topic, "starting consumer worker");

        let (completion_tx, completion_rx) = create_completion_signal();
        let records_processed = Arc::new(AtomicUsize::new(0));

        let handle = ConsumerWorkerHandle {
            state_rx: self.state_tx.subscribe(),
            shutdown_tx: self.shutdown_tx.clone(),
            completion_rx,
            records_processed: records_processed.clone(),
            handle: None,
        };

        let consumer_worker_span = tracing::info_span!(
            "consumer_worker",
            topic = %self.topic,
            group_id = %self.group_id
        );
        let consumer_worker = run_consumer_worker(
            self.client,
            self.poll_timeout,
            self.shutdown_tx.subscribe(),
            self.state_tx,
            records_processed,
            completion_tx,
        )
        .instrument(consumer_worker_span.or_current());

        Ok(ConsumerWorkerHandle {
            handle: Some(tokio::spawn(consumer_worker)),
            ..handle
        })
    }
}

async fn run_consumer_worker<C>(
    mut client: C,
    poll_timeout: Duration,
    mut shutdown_rx: ShutdownRx,
    state_tx: watch::Sender<ConsumerWorkerState>,
    records_processed: Arc<AtomicUsize>,
    completion_tx: CompletionTx,
) -> DemoResult<()>
where
    C: ConsumerClient,
{
    let poll_loop = run_poll_loop(
        &mut client,
        poll_timeout,
        &mut shutdown_rx,
        &state_tx,
        &records_processed,
    );

    let result = match AssertUnwindSafe(poll_loop).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(demo_error!(
            ErrorKind::ConsumerWorkerPanic,
            "Consumer worker poll loop panicked",
            panic_message(panic.as_ref())
        )),
    };

    if let Err(err) = &result {
        error!(error = %err, "consumer worker stopped unexpectedly");
    }

    client.close();
    state_tx.send_replace(ConsumerWorkerState::Closed);
    info!(
        records_processed = records_processed.load(Ordering::SeqCst),
        "consumer worker closed"
    );

    completion_tx.complete();

    result
}

async fn run_poll_loop<C>(
    client: &mut C,
    poll_timeout: Duration,
    shutdown_rx: &mut ShutdownRx,
    state_tx: &watch::Sender<ConsumerWorkerState>,
    records_processed: &AtomicUsize,
) -> DemoResult<()>
where
    C: ConsumerClient,
{
    loop {
        state_tx.send_replace(ConsumerWorkerState::Polling);

        match poll_once(client, poll_timeout, shutdown_rx).await {
            Ok(PollOutcome::Cancelled) => break,
            Ok(PollOutcome::Records(records)) => {
                if records.is_empty() {
                    continue;
                }

                state_tx.send_replace(ConsumerWorkerState::ProcessingBatch);
                for record in records {
                    log_record(&record);
                    records_processed.fetch_add(1, Ordering::SeqCst);
                }
            }
            Err(err) if err.kind() == ErrorKind::PollFailed => {
                warn!(error = %err, "consumer poll failed, polling again");

                // Pause for one wait budget so a broken client cannot spin the loop.
                let cancelled = tokio::select! {
                    biased;

                    _ = wait_for_shutdown(shutdown_rx) => true,
                    _ = tokio::time::sleep(poll_timeout) => false,
                };
                if cancelled {
                    break;
                }
            }
            Err(err) => return Err(err),
        }
    }

    info!("consumer worker received shutdown signal");
    state_tx.send_replace(ConsumerWorkerState::Cancelled);

    Ok(())
}

fn log_record(record: &Record) {
    info!("Key: {}, Value: {}", record.key_str(), record.value);
    info!(
        "Partition: {}, Offset: {}",
        DisplayOption(record.partition),
        DisplayOption(record.offset)
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        return (*message).to_owned();
    }

    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }

    "unknown panic payload".to_owned()
}

#[cfg(test)]
mod tests {
    use kafka_demo_config::shared::{OffsetReset, SerializationFormat};

    use super::*;
    use crate::clients::memory::MemoryBroker;
    use crate::concurrency::shutdown::create_shutdown_channel;

    fn config() -> ConsumerConfig {
        ConsumerConfig {
            group_id: "fourth-consumer-group".to_string(),
            topic: "first_topic".to_string(),
            offset_reset: OffsetReset::Earliest,
            key_format: SerializationFormat::String,
            value_format: SerializationFormat::String,
            session_timeout_ms: ConsumerConfig::DEFAULT_SESSION_TIMEOUT_MS,
            poll_timeout_ms: ConsumerConfig::DEFAULT_POLL_TIMEOUT_MS,
            max_poll_records: ConsumerConfig::DEFAULT_MAX_POLL_RECORDS,
        }
    }

    #[tokio::test]
    async fn poll_once_prefers_an_already_requested_shutdown() {
        let broker = MemoryBroker::new();
        broker
            .append(Record::keyed("first_topic", "id_1", "Hello world 1"))
            .await;
        let mut client = broker.consumer(&config()).unwrap();
        client.subscribe("first_topic").unwrap();

        let (shutdown_tx, mut shutdown_rx) = create_shutdown_channel();
        shutdown_tx.shutdown();

        let outcome = poll_once(&mut client, Duration::from_millis(100), &mut shutdown_rx)
            .await
            .unwrap();
        assert!(matches!(outcome, PollOutcome::Cancelled));

        // The record was not consumed by the cancelled poll.
        let (_, mut running_rx) = create_shutdown_channel();
        let outcome = poll_once(&mut client, Duration::from_millis(100), &mut running_rx)
            .await
            .unwrap();
        assert!(matches!(outcome, PollOutcome::Records(records) if records.len() == 1));
    }

    #[tokio::test]
    async fn new_reports_subscribed_state() {
        let broker = MemoryBroker::new();
        let (shutdown_tx, _) = create_shutdown_channel();

        let worker =
            ConsumerWorker::new(broker.consumer(&config()).unwrap(), &config(), shutdown_tx)
                .unwrap();

        assert_eq!(*worker.state_tx.borrow(), ConsumerWorkerState::Subscribed);
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
