//! One-shot completion signal.
//!
//! The worker owns the single [`CompletionTx`] and consumes it with
//! [`CompletionTx::complete`], so the signal can fire at most once per worker lifetime.
//! Every [`CompletionRx`] clone observes the same event.

use tokio::sync::watch;

#[derive(Debug)]
pub struct CompletionTx(watch::Sender<bool>);

impl CompletionTx {
    /// Marks the worker as done and wakes every waiter.
    pub fn complete(self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRx(watch::Receiver<bool>);

impl CompletionRx {
    /// Waits until completion was signaled.
    ///
    /// Also returns when the [`CompletionTx`] was dropped without completing, which happens
    /// only if the task owning it died. Waiters are released either way.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|completed| *completed).await;
    }

    pub fn is_complete(&self) -> bool {
        *self.0.borrow()
    }
}

pub fn create_completion_signal() -> (CompletionTx, CompletionRx) {
    let (tx, rx) = watch::channel(false);
    (CompletionTx(tx), CompletionRx(rx))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn every_waiter_observes_completion() {
        let (completion_tx, completion_rx) = create_completion_signal();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let mut completion_rx = completion_rx.clone();
                tokio::spawn(async move { completion_rx.wait().await })
            })
            .collect();

        assert!(!completion_rx.is_complete());
        completion_tx.complete();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter released")
                .unwrap();
        }
        assert!(completion_rx.is_complete());
    }

    #[tokio::test]
    async fn late_waiters_return_immediately() {
        let (completion_tx, mut completion_rx) = create_completion_signal();
        completion_tx.complete();

        tokio::time::timeout(Duration::from_millis(50), completion_rx.wait())
            .await
            .expect("completion already fired");
    }

    #[tokio::test]
    async fn dropped_sender_releases_waiters() {
        let (completion_tx, mut completion_rx) = create_completion_signal();
        drop(completion_tx);

        tokio::time::timeout(Duration::from_millis(50), completion_rx.wait())
            .await
            .expect("dead worker releases waiters");
        assert!(!completion_rx.is_complete());
    }
}
