use super::{CLOSED, Lifecycle, Trigger, runtime};
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, warn};

/// Repeating trigger.
///
/// Waits `delay`, runs the handler, then re-arms. The first handler error
/// closes the trigger. Runs never overlap: the next wait starts when the
/// previous run finishes.
pub struct Recurring {
    delay: Duration,
    lifecycle: Arc<Lifecycle>,
}

impl Recurring {
    /// Arm a recurring trigger on the current tokio runtime.
    pub fn new<F, Fut>(delay: Duration, mut handler: F) -> Result<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let runtime = runtime()?;
        let lifecycle = Arc::new(Lifecycle::new());
        let task = Arc::clone(&lifecycle);

        runtime.spawn(async move {
            let mut runs: u64 = 0;
            while task.wait(delay).await && task.begin_firing() {
                runs += 1;
                if let Err(err) = handler().await {
                    warn!(?delay, runs, error = %err, "recurring handler failed, stopping");
                    task.state.store(CLOSED, Ordering::Release);
                    return;
                }
                if !task.rearm() {
                    break;
                }
            }
            debug!(?delay, runs, "recurring trigger stopped");
        });

        debug!(?delay, "recurring trigger armed");
        Ok(Self { delay, lifecycle })
    }
}

impl Trigger for Recurring {
    fn delay(&self) -> Duration {
        self.delay
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    fn close(&self) {
        if self.lifecycle.close() {
            debug!(delay = ?self.delay, "recurring trigger closed");
        }
    }
}

impl Drop for Recurring {
    fn drop(&mut self) {
        self.lifecycle.close();
    }
}
