use std::io;
use std::sync::Once;

use kafka_demo_config::Environment;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Directory receiving rolling log files in production.
const LOGS_DIR: &str = "logs";

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Filter used by tests when `RUST_LOG` is not set.
const DEFAULT_TEST_LOG_FILTER: &str = "debug";

/// Tests only install a subscriber when this variable is set.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors that can occur while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to bridge `log` records into tracing: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the global tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Keeps the background log writer alive.
///
/// Buffered lines are flushed when this guard is dropped, so binaries must hold it until
/// they return from `main`.
#[must_use = "dropping the flusher stops the background log writer"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for `app_name` in the environment named by
/// `APP_ENVIRONMENT`.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load()?;

    init_tracing_for(app_name, environment)
}

/// Installs the global subscriber for an explicit environment.
///
/// In [`Environment::Dev`] human readable lines go to stdout. In [`Environment::Prod`] JSON
/// lines go to a daily rolling file under `logs/`. Records emitted through the `log` crate,
/// e.g. by librdkafka bindings, are forwarded into tracing in both cases.
pub fn init_tracing_for(
    app_name: &str,
    environment: Environment,
) -> Result<LogFlusher, TracingError> {
    LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (guard, dev_layer, prod_layer) = if environment.is_prod() {
        let file_appender = rolling::daily(LOGS_DIR, format!("{app_name}.log"));
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer);

        (guard, None, Some(layer))
    } else {
        let (writer, guard) = tracing_appender::non_blocking(io::stdout());
        let layer = fmt::layer().with_thread_names(true).with_writer(writer);

        (guard, Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(dev_layer)
        .with(prod_layer)
        .try_init()?;

    ::tracing::info!(app = app_name, %environment, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber writing through the test harness capture.
///
/// Does nothing unless `ENABLE_TRACING` is set, and installs at most once per process.
pub fn init_test_tracing() {
    if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
        return;
    }

    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_LOG_FILTER));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
