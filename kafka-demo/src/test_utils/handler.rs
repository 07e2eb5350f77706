use crate::error::{DemoError, ErrorKind};
use crate::producer::DeliveryHandler;
use crate::types::Record;

/// One delivery callback as seen by a [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { key: String, delivered: Record },
    Failed { key: String, kind: ErrorKind },
}

impl DeliveryOutcome {
    pub fn key(&self) -> &str {
        match self {
            DeliveryOutcome::Delivered { key, .. } | DeliveryOutcome::Failed { key, .. } => key,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Handler that keeps every callback in invocation order.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    outcomes: Vec<DeliveryOutcome>,
}

impl RecordingHandler {
    pub fn outcomes(&self) -> &[DeliveryOutcome] {
        &self.outcomes
    }
}

impl DeliveryHandler for RecordingHandler {
    fn on_delivery(&mut self, record: &Record, result: Result<&Record, &DemoError>) {
        let key = record.key_str().to_owned();
        let outcome = match result {
            Ok(delivered) => DeliveryOutcome::Delivered {
                key,
                delivered: delivered.clone(),
            },
            Err(err) => DeliveryOutcome::Failed {
                key,
                kind: err.kind(),
            },
        };

        self.outcomes.push(outcome);
    }
}
