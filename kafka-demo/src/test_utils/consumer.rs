use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use crate::bail;
use crate::clients::ConsumerClient;
use crate::error::{DemoResult, ErrorKind};
use crate::test_utils::notify::TimedNotify;
use crate::types::Record;

/// What a single call to [`ScriptedConsumer::poll`] does.
#[derive(Debug, Clone)]
pub enum PollStep {
    /// Returns these records immediately.
    Records(Vec<Record>),
    /// Fails with an error of this kind.
    Fail(ErrorKind),
    /// Panics inside the poll.
    Panic,
}

#[derive(Debug, Default)]
struct Probe {
    subscribed: AtomicBool,
    polls: AtomicUsize,
    closes: AtomicUsize,
    polled: Arc<Notify>,
}

/// Observes a [`ScriptedConsumer`] after it was moved into a worker.
#[derive(Debug, Clone)]
pub struct ConsumerProbe {
    probe: Arc<Probe>,
}

impl ConsumerProbe {
    pub fn is_subscribed(&self) -> bool {
        self.probe.subscribed.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.probe.polls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.probe.closes.load(Ordering::SeqCst)
    }

    /// Returns a notification fired every time a poll starts.
    pub fn polled(&self) -> TimedNotify {
        TimedNotify::new(self.probe.polled.clone())
    }
}

/// Consumer that plays back a list of [`PollStep`]s and then stays idle, each idle poll
/// taking its full wait budget.
#[derive(Debug)]
pub struct ScriptedConsumer {
    steps: VecDeque<PollStep>,
    fail_subscribe: bool,
    closed: bool,
    probe: Arc<Probe>,
}

impl ScriptedConsumer {
    pub fn new(steps: impl IntoIterator<Item = PollStep>) -> (Self, ConsumerProbe) {
        let probe = Arc::new(Probe::default());
        let consumer = Self {
            steps: steps.into_iter().collect(),
            fail_subscribe: false,
            closed: false,
            probe: probe.clone(),
        };

        (consumer, ConsumerProbe { probe })
    }

    /// A consumer that never returns records.
    pub fn idle() -> (Self, ConsumerProbe) {
        Self::new([])
    }

    /// Makes [`ConsumerClient::subscribe`] fail.
    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }
}

impl ConsumerClient for ScriptedConsumer {
    fn subscribe(&mut self, topic: &str) -> DemoResult<()> {
        if self.fail_subscribe {
            bail!(ErrorKind::SubscribeFailed, "Scripted subscription failure", topic);
        }

        self.probe.subscribed.store(true, Ordering::SeqCst);

        Ok(())
    }

    async fn poll(&mut self, max_wait: Duration) -> DemoResult<Vec<Record>> {
        if self.closed {
            bail!(ErrorKind::InvalidState, "Scripted consumer is closed");
        }

        self.probe.polls.fetch_add(1, Ordering::SeqCst);
        self.probe.polled.notify_waiters();

        match self.steps.pop_front() {
            Some(PollStep::Records(records)) => Ok(records),
            Some(PollStep::Fail(kind)) => bail!(kind, "Scripted poll failure"),
            Some(PollStep::Panic) => panic!("scripted consumer panic"),
            None => {
                tokio::time::sleep(max_wait).await;
                Ok(Vec::new())
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
