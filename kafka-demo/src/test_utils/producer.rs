use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::bail;
use crate::clients::ProducerClient;
use crate::clients::memory::MemoryProducer;
use crate::error::{DemoResult, ErrorKind};
use crate::types::{Delivery, Record};

/// Operations observed by a [`FaultyProducer`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerCall {
    Send(String),
    Flush,
    Close,
}

/// Producer that forwards to a [`MemoryProducer`] except for records whose key was
/// configured to fail.
#[derive(Debug)]
pub struct FaultyProducer {
    inner: MemoryProducer,
    failing_keys: HashSet<String>,
    fail_flush: bool,
    calls: Arc<Mutex<Vec<ProducerCall>>>,
}

impl FaultyProducer {
    pub fn wrap(inner: MemoryProducer) -> Self {
        Self {
            inner,
            failing_keys: HashSet::new(),
            fail_flush: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes sends of records keyed `key` fail with [`ErrorKind::SendFailed`].
    pub fn fail_key(mut self, key: impl Into<String>) -> Self {
        self.failing_keys.insert(key.into());
        self
    }

    pub fn fail_flush(mut self) -> Self {
        self.fail_flush = true;
        self
    }

    /// Returns a shared view of the recorded calls, usable after the producer was moved.
    pub fn calls(&self) -> Arc<Mutex<Vec<ProducerCall>>> {
        self.calls.clone()
    }
}

impl ProducerClient for FaultyProducer {
    async fn send(&self, record: &Record, timeout: Duration) -> DemoResult<Delivery> {
        let key = record.key_str().to_owned();
        self.calls.lock().await.push(ProducerCall::Send(key.clone()));

        if self.failing_keys.contains(&key) {
            bail!(ErrorKind::SendFailed, "Injected send failure", key);
        }

        self.inner.send(record, timeout).await
    }

    async fn flush(&self, timeout: Duration) -> DemoResult<()> {
        self.calls.lock().await.push(ProducerCall::Flush);

        if self.fail_flush {
            bail!(ErrorKind::FlushFailed, "Injected flush failure");
        }

        self.inner.flush(timeout).await
    }

    fn close(&mut self) {
        // `close` is synchronous, the lock is uncontended once sends and flush returned.
        if let Ok(mut calls) = self.calls.try_lock() {
            calls.push(ProducerCall::Close);
        }

        self.inner.close();
    }
}
