use super::{CLOSED, Lifecycle, Trigger, runtime};
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, warn};

/// One-shot trigger: runs its handler once after `delay` unless closed first.
pub struct Pulse {
    delay: Duration,
    lifecycle: Arc<Lifecycle>,
}

impl Pulse {
    /// Arm a pulse on the current tokio runtime.
    pub fn new<F, Fut>(delay: Duration, handler: F) -> Result<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let runtime = runtime()?;
        let lifecycle = Arc::new(Lifecycle::new());
        let task = Arc::clone(&lifecycle);

        runtime.spawn(async move {
            if !task.wait(delay).await || !task.begin_firing() {
                debug!(?delay, "pulse cancelled");
                return;
            }
            if let Err(err) = handler().await {
                warn!(?delay, error = %err, "pulse handler failed");
            }
            task.state.store(CLOSED, Ordering::Release);
        });

        debug!(?delay, "pulse armed");
        Ok(Self { delay, lifecycle })
    }
}

impl Trigger for Pulse {
    fn delay(&self) -> Duration {
        self.delay
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    fn close(&self) {
        if self.lifecycle.close() {
            debug!(delay = ?self.delay, "pulse closed");
        }
    }
}

impl Drop for Pulse {
    fn drop(&mut self) {
        self.lifecycle.close();
    }
}
