//! Ties the consumer worker to the process lifecycle.
//!
//! [`ConsumerApp`] exposes an explicit `start`/`stop`/`wait` lifecycle. Signal handling is
//! separate: [`install_shutdown_handler`] turns Ctrl+C (and SIGTERM on unix) into a call to
//! the cancellation token and then blocks until the worker reported completion.

use std::future::Future;
use std::io;

use kafka_demo_config::shared::ConsumerConfig;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bail;
use crate::clients::ConsumerClient;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::concurrency::signal::CompletionRx;
use crate::error::{DemoResult, ErrorKind};
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::consumer::{ConsumerWorker, ConsumerWorkerHandle, ConsumerWorkerState};

#[derive(Debug)]
enum AppState<C> {
    NotStarted { worker: ConsumerWorker<C> },
    Started { worker: ConsumerWorkerHandle },
    Starting,
}

/// Consumer application owning a single [`ConsumerWorker`].
#[derive(Debug)]
pub struct ConsumerApp<C> {
    state: AppState<C>,
    shutdown_tx: ShutdownTx,
}

impl<C> ConsumerApp<C>
where
    C: ConsumerClient + Send + 'static,
{
    /// Builds the application around an already connected client and subscribes it.
    pub fn new(client: C, config: &ConsumerConfig) -> DemoResult<Self> {
        let (shutdown_tx, _) = create_shutdown_channel();
        let worker = ConsumerWorker::new(client, config, shutdown_tx.clone())?;

        Ok(Self {
            state: AppState::NotStarted { worker },
            shutdown_tx,
        })
    }

    /// Starts the consumer worker on its own task.
    pub async fn start(&mut self) -> DemoResult<()> {
        let worker = match std::mem::replace(&mut self.state, AppState::Starting) {
            AppState::NotStarted { worker } => worker,
            state => {
                self.state = state;
                bail!(ErrorKind::InvalidState, "Consumer app was already started");
            }
        };

        info!("starting consumer app");
        let Ok(worker) = worker.start().await;
        self.state = AppState::Started { worker };

        Ok(())
    }

    /// Requests the worker to stop without waiting for it.
    ///
    /// Idempotent. Calling it before [`ConsumerApp::start`] makes the worker stop right after
    /// it started.
    pub fn stop(&self) {
        if self.shutdown_tx.shutdown() {
            info!("stopping consumer app");
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Returns the completion signal of the worker, once started.
    pub fn completion(&self) -> Option<CompletionRx> {
        match &self.state {
            AppState::Started { worker } => Some(worker.completion()),
            _ => None,
        }
    }

    pub fn state(&self) -> Option<ConsumerWorkerState> {
        match &self.state {
            AppState::Started { worker } => Some(worker.state()),
            _ => None,
        }
    }

    /// Waits for the worker to close its connection and returns how it ended.
    pub async fn wait(self) -> DemoResult<()> {
        let AppState::Started { worker } = self.state else {
            info!("consumer app was not started, nothing to wait for");

            return Ok(());
        };

        let result = worker.wait().await;
        info!("application is closing");

        result
    }
}

/// Waits for `shutdown_signal`, requests shutdown and blocks until the worker completed.
///
/// Used by [`install_shutdown_handler`] with the process signals; any future can stand in
/// for them.
pub async fn coordinate_shutdown<F>(
    shutdown_signal: F,
    shutdown_tx: ShutdownTx,
    mut completion_rx: CompletionRx,
) where
    F: Future<Output = io::Result<()>>,
{
    if let Err(err) = shutdown_signal.await {
        error!(error = %err, "failed to listen for shutdown signals");
        return;
    }

    info!("caught shutdown signal");
    shutdown_tx.shutdown();

    completion_rx.wait().await;
    info!("application has exited");
}

/// Spawns a task that shuts the application down on Ctrl+C or SIGTERM.
///
/// The returned handle can be aborted when the worker finished on its own.
pub fn install_shutdown_handler(
    shutdown_tx: ShutdownTx,
    completion_rx: CompletionRx,
) -> JoinHandle<()> {
    tokio::spawn(coordinate_shutdown(
        process_shutdown_signal(),
        shutdown_tx,
        completion_rx,
    ))
}

#[cfg(unix)]
async fn process_shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("sigint (ctrl+c) received");
        }
        _ = sigterm.recv() => {
            info!("sigterm received");
        }
    }

    Ok(())
}

#[cfg(not(unix))]
async fn process_shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("ctrl+c received");

    Ok(())
}
