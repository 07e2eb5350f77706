use std::sync::Arc;

use tokio::sync::watch;

/// Receiver side of the cancellation token.
///
/// Holds `true` once shutdown was requested.
pub type ShutdownRx = watch::Receiver<bool>;

/// Sender side of the cancellation token.
///
/// Cloning is cheap and every clone controls the same token. Requesting shutdown is
/// idempotent and the token can never be reset.
#[derive(Debug, Clone)]
pub struct ShutdownTx(Arc<watch::Sender<bool>>);

impl ShutdownTx {
    /// Requests shutdown without waiting for anybody to observe it.
    ///
    /// Returns `true` only for the call that actually flipped the token.
    pub fn shutdown(&self) -> bool {
        self.0.send_if_modified(|requested| {
            if *requested {
                return false;
            }

            *requested = true;
            true
        })
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a cancellation token in the "running" state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(Arc::new(tx)), rx)
}

/// Resolves once shutdown has been requested.
///
/// Returns immediately when the token is already set. If every sender is gone without
/// requesting shutdown nobody can cancel anymore, so the future never resolves.
pub async fn wait_for_shutdown(shutdown_rx: &mut ShutdownRx) {
    let requested = shutdown_rx.wait_for(|requested| *requested).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}
