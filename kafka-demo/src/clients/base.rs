use std::future::Future;
use std::time::Duration;

use kafka_demo_config::shared::SerializationFormat;

use crate::demo_error;
use crate::error::{DemoResult, ErrorKind};
use crate::types::{Delivery, Record};

/// Consuming side of a broker connection.
///
/// A client is created already connected (each implementation exposes its own `connect`
/// constructor) and is exclusively owned by one consumer worker.
///
/// There is no explicit `interrupt` operation: the worker races [`ConsumerClient::poll`]
/// against its cancellation token and drops the in-flight poll future when the token fires.
/// Implementations must therefore be cancellation safe, dropping a pending poll must leave
/// the client usable and must not lose records that were not returned yet.
pub trait ConsumerClient {
    /// Registers interest in `topic`.
    fn subscribe(&mut self, topic: &str) -> DemoResult<()>;

    /// Returns the records that became available within `max_wait`, possibly none.
    fn poll(&mut self, max_wait: Duration) -> impl Future<Output = DemoResult<Vec<Record>>> + Send;

    /// Releases the connection. Calling it more than once has no further effect.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Producing side of a broker connection.
pub trait ProducerClient {
    /// Sends `record` and resolves once the broker acknowledged or rejected it, or
    /// `timeout` elapsed.
    fn send(
        &self,
        record: &Record,
        timeout: Duration,
    ) -> impl Future<Output = DemoResult<Delivery>> + Send;

    /// Blocks until every buffered record has been delivered or `timeout` elapsed.
    fn flush(&self, timeout: Duration) -> impl Future<Output = DemoResult<()>> + Send;

    /// Releases the connection. Calling it more than once has no further effect.
    fn close(&mut self);
}

/// Decodes a key or value according to the configured format.
pub fn decode_field(
    bytes: &[u8],
    format: SerializationFormat,
    field: &'static str,
) -> DemoResult<String> {
    match format {
        SerializationFormat::String => std::str::from_utf8(bytes)
            .map(ToOwned::to_owned)
            .map_err(|err| {
                demo_error!(
                    ErrorKind::SerializationError,
                    "Record field is not valid UTF-8",
                    field,
                    source: err
                )
            }),
        SerializationFormat::LossyString => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_decoding_rejects_invalid_utf8() {
        let err = decode_field(&[0x66, 0xff], SerializationFormat::String, "value").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SerializationError);
        assert_eq!(err.detail(), Some("value"));
    }

    #[test]
    fn lossy_decoding_replaces_invalid_sequences() {
        let decoded = decode_field(&[0x66, 0xff], SerializationFormat::LossyString, "key").unwrap();

        assert_eq!(decoded, "f\u{fffd}");
    }

    #[test]
    fn default_format_keeps_records_with_invalid_utf8() {
        let decoded = decode_field(&[0x66, 0xff], SerializationFormat::default(), "value").unwrap();

        assert_eq!(decoded, "f\u{fffd}");
    }
}
