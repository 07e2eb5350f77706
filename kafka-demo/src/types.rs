//! Records exchanged with the broker.

use std::fmt;

/// Broker assigned position of an acknowledged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
    /// Milliseconds since the Unix epoch, when the broker or client reported one.
    pub timestamp: Option<i64>,
}

/// A keyed record of a topic.
///
/// Records built by a producer only carry topic, key and value. The position fields are
/// filled in from the acknowledgment ([`Record::with_delivery`]) or, for consumed records,
/// by the client that fetched them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub key: Option<String>,
    pub value: String,
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub timestamp: Option<i64>,
}

impl Record {
    /// Creates a record that has not been sent yet.
    pub fn new(topic: impl Into<String>, key: Option<String>, value: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key,
            value: value.into(),
            partition: None,
            offset: None,
            timestamp: None,
        }
    }

    pub fn keyed(
        topic: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(topic, Some(key.into()), value)
    }

    /// Returns a copy of this record positioned where the broker stored it.
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.partition = Some(delivery.partition);
        self.offset = Some(delivery.offset);
        self.timestamp = delivery.timestamp;
        self
    }

    pub fn key_str(&self) -> &str {
        self.key.as_deref().unwrap_or("null")
    }
}

/// Renders an optional position the way the logs print it.
pub(crate) struct DisplayOption<T>(pub Option<T>);

impl<T: fmt::Display> fmt::Display for DisplayOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("none"),
        }
    }
}
