use std::future::Future;

use crate::error::DemoResult;

/// Trait for background workers.
///
/// Starting a worker moves it onto its own task and returns a handle. The generic parameter
/// `H` is the handle type and `S` the state type readable through it.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    /// Error type returned when worker startup fails.
    type Error;

    /// Starts the worker and returns a handle for monitoring its execution.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle for monitoring and controlling a running worker.
///
/// The handle stays valid after the worker completed, so the final state can still be read.
pub trait WorkerHandle<S> {
    /// Returns a snapshot of the worker state.
    fn state(&self) -> S;

    /// Waits for the worker to finish and returns its result, consuming the handle.
    fn wait(self) -> impl Future<Output = DemoResult<()>> + Send;
}
