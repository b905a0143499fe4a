//! One-shot delayed callbacks on the tokio runtime.

use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a callback scheduled to run once after a delay.
///
/// Dropping the handle leaves the callback scheduled; call [`DelayedTask::cancel`]
/// to stop it.
#[derive(Debug)]
pub(crate) struct DelayedTask {
    task: JoinHandle<()>,
}

impl DelayedTask {
    /// Run `callback` after `delay`. Must be called from within a tokio runtime.
    pub(crate) fn schedule<F>(delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        Self { task }
    }

    /// Stop the callback if it has not fired yet.
    pub(crate) fn cancel(self) {
        self.task.abort();
    }
}
