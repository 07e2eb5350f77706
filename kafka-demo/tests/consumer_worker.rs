#![cfg(feature = "test-utils")]

use std::time::Duration;

use kafka_demo::clients::memory::MemoryBroker;
use kafka_demo::concurrency::shutdown::create_shutdown_channel;
use kafka_demo::error::ErrorKind;
use kafka_demo::producer::keyed_records;
use kafka_demo::test_utils::config::{TEST_TOPIC, consumer_config};
use kafka_demo::test_utils::consumer::{PollStep, ScriptedConsumer};
use kafka_demo::types::Record;
use kafka_demo::workers::base::{Worker, WorkerHandle};
use kafka_demo::workers::consumer::{ConsumerWorker, ConsumerWorkerState};
use kafka_demo_telemetry::tracing::init_test_tracing;
use tokio::time::{Instant, sleep, timeout};

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not reached in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_worker_stops_within_one_wait_budget() {
    init_test_tracing();

    let broker = MemoryBroker::new();
    let (shutdown_tx, _) = create_shutdown_channel();
    let client = broker.consumer(&consumer_config()).unwrap();
    let worker = ConsumerWorker::new(client, &consumer_config(), shutdown_tx).unwrap();

    let handle = worker.start().await.unwrap();
    let mut completion = handle.completion();

    sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.state(), ConsumerWorkerState::Polling);

    let shutdown_requested_at = Instant::now();
    handle.shutdown();
    timeout(Duration::from_millis(150), completion.wait())
        .await
        .expect("idle worker completes within one wait budget");

    assert!(shutdown_requested_at.elapsed() < Duration::from_millis(150));
    assert_eq!(broker.consumer_closes(), 1);
    assert_eq!(handle.state(), ConsumerWorkerState::Closed);
    assert_eq!(handle.records_processed(), 0);
    handle.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_shutdown_requests_complete_once() {
    init_test_tracing();

    let (client, probe) = ScriptedConsumer::idle();
    let (shutdown_tx, _) = create_shutdown_channel();
    let worker = ConsumerWorker::new(client, &consumer_config(), shutdown_tx).unwrap();
    let handle = worker.start().await.unwrap();

    let requesters: Vec<_> = (0..4)
        .map(|_| {
            let shutdown_tx = handle.shutdown_tx();
            std::thread::spawn(move || {
                shutdown_tx.shutdown();
            })
        })
        .collect();
    for requester in requesters {
        requester.join().unwrap();
    }
    handle.shutdown();

    let mut first = handle.completion();
    let mut second = handle.completion();
    timeout(Duration::from_secs(1), first.wait()).await.unwrap();
    timeout(Duration::from_secs(1), second.wait()).await.unwrap();

    // Shutting down a closed worker is still allowed and has no effect.
    handle.shutdown();

    assert_eq!(probe.closes(), 1);
    handle.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn close_happens_before_completion_on_cancellation() {
    init_test_tracing();

    let (client, probe) = ScriptedConsumer::idle();
    let (shutdown_tx, _) = create_shutdown_channel();
    let worker = ConsumerWorker::new(client, &consumer_config(), shutdown_tx).unwrap();
    let handle = worker.start().await.unwrap();

    let mut completion = handle.completion();
    let observer_probe = probe.clone();
    let observer = tokio::spawn(async move {
        completion.wait().await;
        observer_probe.closes()
    });

    probe.polled().notified().await;
    handle.shutdown();

    assert_eq!(observer.await.unwrap(), 1);
    handle.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn records_are_processed_in_broker_order() {
    init_test_tracing();

    let broker = MemoryBroker::with_partitions(1);
    for record in keyed_records(TEST_TOPIC, 10) {
        broker.append(record).await;
    }

    let (shutdown_tx, _) = create_shutdown_channel();
    let client = broker.consumer(&consumer_config()).unwrap();
    let worker = ConsumerWorker::new(client, &consumer_config(), shutdown_tx).unwrap();
    let handle = worker.start().await.unwrap();

    wait_until(|| handle.records_processed() == 10).await;

    handle.shutdown();
    handle.wait().await.unwrap();

    let stored: Vec<_> = broker
        .records(TEST_TOPIC)
        .await
        .into_iter()
        .map(|record| record.offset)
        .collect();
    assert_eq!(stored, (0..10).map(Some).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_errors_do_not_stop_the_worker() {
    init_test_tracing();

    let records = vec![
        Record::keyed(TEST_TOPIC, "id_1", "Hello world 1"),
        Record::keyed(TEST_TOPIC, "id_2", "Hello world 2"),
    ];
    let (client, probe) = ScriptedConsumer::new([
        PollStep::Fail(ErrorKind::PollFailed),
        PollStep::Fail(ErrorKind::PollFailed),
        PollStep::Records(records),
    ]);
    let (shutdown_tx, _) = create_shutdown_channel();
    let worker = ConsumerWorker::new(client, &consumer_config(), shutdown_tx).unwrap();
    let handle = worker.start().await.unwrap();

    wait_until(|| handle.records_processed() == 2).await;
    assert!(probe.polls() >= 3);
    assert_ne!(handle.state(), ConsumerWorkerState::Closed);
    assert_eq!(probe.closes(), 0);

    handle.shutdown();
    handle.wait().await.unwrap();
    assert_eq!(probe.closes(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_interrupts_the_pause_after_a_poll_error() {
    init_test_tracing();

    let mut config = consumer_config();
    config.poll_timeout_ms = 5_000;
    let (client, probe) = ScriptedConsumer::new([PollStep::Fail(ErrorKind::PollFailed)]);
    let (shutdown_tx, _) = create_shutdown_channel();
    let worker = ConsumerWorker::new(client, &config, shutdown_tx).unwrap();
    let handle = worker.start().await.unwrap();

    wait_until(|| probe.polls() == 1).await;
    handle.shutdown();

    timeout(Duration::from_millis(500), handle.wait())
        .await
        .expect("pause is interrupted by shutdown")
        .unwrap();
    assert_eq!(probe.polls(), 1);
    assert_eq!(probe.closes(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unexpected_error_closes_and_completes() {
    init_test_tracing();

    let (client, probe) = ScriptedConsumer::new([PollStep::Fail(ErrorKind::Unknown)]);
    let (shutdown_tx, _) = create_shutdown_channel();
    let worker = ConsumerWorker::new(client, &consumer_config(), shutdown_tx).unwrap();
    let handle = worker.start().await.unwrap();

    let mut completion = handle.completion();
    timeout(Duration::from_secs(1), completion.wait())
        .await
        .expect("worker completes after an unexpected error");

    assert_eq!(probe.closes(), 1);
    assert_eq!(handle.state(), ConsumerWorkerState::Closed);
    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
}

#[tokio::test(flavor = "multi_thread")]
async fn panic_in_poll_still_closes_before_completion() {
    init_test_tracing();

    let (client, probe) = ScriptedConsumer::new([PollStep::Panic]);
    let (shutdown_tx, _) = create_shutdown_channel();
    let worker = ConsumerWorker::new(client, &consumer_config(), shutdown_tx).unwrap();
    let handle = worker.start().await.unwrap();

    let mut completion = handle.completion();
    let observer_probe = probe.clone();
    let observer = tokio::spawn(async move {
        completion.wait().await;
        observer_probe.closes()
    });

    assert_eq!(observer.await.unwrap(), 1);
    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConsumerWorkerPanic);
    assert_eq!(err.detail(), Some("scripted consumer panic"));
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_before_start_skips_polling() {
    init_test_tracing();

    let (client, probe) = ScriptedConsumer::idle();
    let (shutdown_tx, _) = create_shutdown_channel();
    shutdown_tx.shutdown();
    let worker = ConsumerWorker::new(client, &consumer_config(), shutdown_tx).unwrap();
    let handle = worker.start().await.unwrap();

    timeout(Duration::from_secs(1), handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(probe.polls(), 0);
    assert_eq!(probe.closes(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_subscription_closes_the_client() {
    init_test_tracing();

    let (client, probe) = ScriptedConsumer::idle();
    let (shutdown_tx, _) = create_shutdown_channel();

    let err = ConsumerWorker::new(client.failing_subscribe(), &consumer_config(), shutdown_tx)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SubscribeFailed);
    assert!(!probe.is_subscribed());
    assert_eq!(probe.closes(), 1);
}
