//! Delayed background jobs with cancellation.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{StoreError, StoreResult};

/// Handle to a job scheduled with [`defer`].
#[derive(Debug)]
pub struct DeferredTask<T> {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<Option<T>>,
}

impl<T> DeferredTask<T> {
    /// Cancel the job if it has not started yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the job. `None` if it was cancelled or produced nothing.
    pub async fn wait(self) -> Option<T> {
        match self.handle.await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(task = self.name, "Deferred task failed: {}", e);
                None
            }
        }
    }
}

/// Run `job` on the current tokio runtime after `delay`, unless `parent`
/// (or the returned task) is cancelled first.
///
/// # Errors
/// Returns `StoreError::NoRuntime` outside a tokio runtime.
pub fn defer<T, F>(
    parent: &CancellationToken,
    delay: Duration,
    name: &'static str,
    job: F,
) -> StoreResult<DeferredTask<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Option<T> + Send + 'static,
{
    let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
    let token = parent.child_token();
    let cancelled = token.clone();

    let handle = runtime.spawn(async move {
        tokio::select! {
            _ = cancelled.cancelled() => {
                tracing::debug!(task = name, "Deferred task cancelled");
                None
            }
            _ = tokio::time::sleep(delay) => {
                tracing::debug!(task = name, "Running deferred task");
                job()
            }
        }
    });

    Ok(DeferredTask {
        name,
        token,
        handle,
    })
}
