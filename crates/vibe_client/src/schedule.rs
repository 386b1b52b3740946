use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A background task bound to a cancellation token. Dropping the task
/// cancels it.
#[derive(Debug)]
pub struct ScheduledTask {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawns `task` with a child of `parent`; cancelling either stops it.
    pub fn spawn<F, Fut>(runtime: &Handle, parent: &CancellationToken, task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = parent.child_token();
        let join = runtime.spawn(task(cancel.clone()));
        Self { cancel, join }
    }

    /// Runs `tick` immediately and then every `interval` until cancelled.
    /// A slow tick delays the next one instead of overlapping it.
    pub fn every<F, Fut>(
        runtime: &Handle,
        parent: &CancellationToken,
        interval: Duration,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(runtime, parent, move |cancel| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        })
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
