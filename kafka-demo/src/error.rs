//! Error type shared by the clients, the consumer worker and the producer runner.
//!
//! [`DemoError`] carries an [`ErrorKind`] used to decide how the caller reacts (for example
//! the consumer worker keeps polling after [`ErrorKind::PollFailed`]), a static description,
//! optional dynamic detail, the originating error and the location where it was raised.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use rdkafka::error::KafkaError;

/// Result type used throughout the crate.
pub type DemoResult<T> = Result<T, DemoError>;

/// Classification of failures.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Setup errors, fatal for the affected runner.
    ConnectFailed,
    SubscribeFailed,
    ConfigError,

    // Steady state errors.
    PollFailed,
    SendFailed,
    FlushFailed,
    SerializationError,

    // Lifecycle errors.
    InvalidState,
    ConsumerWorkerPanic,
    ConsumerWorkerCancelled,

    IoError,
    Unknown,
}

/// Main error type of the crate.
#[derive(Debug, Clone)]
pub struct DemoError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl DemoError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches the originating error, exposed through [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        DemoError {
            kind,
            description,
            detail,
            source: None,
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }
}

impl PartialEq for DemoError {
    fn eq(&self, other: &DemoError) -> bool {
        self.kind == other.kind && self.description == other.description
    }
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = &self.detail {
            write!(f, "\n  Detail: {detail}")?;
        }

        if let Some(source) = &self.source {
            write!(f, "\n  Caused by: {source}")?;
        }

        Ok(())
    }
}

impl error::Error for DemoError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for DemoError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> DemoError {
        DemoError::from_components(kind, Cow::Borrowed(description), None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for DemoError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> DemoError {
        DemoError::from_components(kind, Cow::Borrowed(description), Some(detail.into()))
    }
}

impl From<std::io::Error> for DemoError {
    #[track_caller]
    fn from(err: std::io::Error) -> DemoError {
        DemoError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(err.to_string())),
        )
        .with_source(err)
    }
}

/// Maps librdkafka failures onto the closest [`ErrorKind`].
///
/// Call sites that know what they were doing should prefer wrapping the error with
/// [`crate::demo_error!`] and an explicit kind.
impl From<KafkaError> for DemoError {
    #[track_caller]
    fn from(err: KafkaError) -> DemoError {
        let (kind, description) = match &err {
            KafkaError::ClientCreation(_) | KafkaError::MetadataFetch(_) => {
                (ErrorKind::ConnectFailed, "Kafka client could not connect")
            }
            KafkaError::ClientConfig(..) => (ErrorKind::ConfigError, "Invalid Kafka client config"),
            KafkaError::Subscription(_) => {
                (ErrorKind::SubscribeFailed, "Kafka subscription failed")
            }
            KafkaError::MessageConsumption(_) => {
                (ErrorKind::PollFailed, "Kafka message consumption failed")
            }
            KafkaError::MessageProduction(_) => {
                (ErrorKind::SendFailed, "Kafka message production failed")
            }
            KafkaError::Flush(_) => (ErrorKind::FlushFailed, "Kafka producer flush failed"),
            _ => (ErrorKind::Unknown, "Kafka client operation failed"),
        };

        DemoError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(err.to_string())),
        )
        .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_error;
    use rdkafka::types::RDKafkaErrorCode;

    #[test]
    fn display_includes_kind_detail_and_location() {
        let err = demo_error!(ErrorKind::PollFailed, "Poll failed", "broker went away");
        let rendered = err.to_string();

        assert!(rendered.starts_with("[PollFailed] Poll failed @ "));
        assert!(rendered.contains("error.rs"));
        assert!(rendered.contains("Detail: broker went away"));
    }

    #[test]
    fn kafka_errors_are_classified() {
        let err: DemoError =
            KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut).into();
        assert_eq!(err.kind(), ErrorKind::SendFailed);
        assert!(error::Error::source(&err).is_some());

        let err: DemoError = KafkaError::Subscription("first_topic".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::SubscribeFailed);

        let err: DemoError = KafkaError::Canceled.into();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn equality_ignores_detail_and_location() {
        let a = demo_error!(ErrorKind::SendFailed, "Send failed", "id_1");
        let b = demo_error!(ErrorKind::SendFailed, "Send failed", "id_2");

        assert_eq!(a, b);
    }
}
