//! Timer-driven callbacks.
//!
//! A trigger runs its handler on a tokio task after a fixed delay:
//! [`Pulse`] once, [`Recurring`] repeatedly until closed or until the handler
//! fails. Handlers are async closures returning `Result<()>`; errors are
//! logged, never propagated.
//!
//! States: `running -> closed`. [`Trigger::close`] is idempotent and stops
//! future firings without waiting for a handler already in progress.
//! Dropping a trigger closes it.

mod pulse;
mod recurring;

pub use pulse::Pulse;
pub use recurring::Recurring;

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;

/// Common surface of every trigger.
pub trait Trigger: Send + Sync {
    /// Interval fixed at construction.
    fn delay(&self) -> Duration;

    fn is_running(&self) -> bool;

    /// Cancel future firings. Closing twice is a no-op.
    fn close(&self);
}

const ARMED: u8 = 0;
const FIRING: u8 = 1;
const CLOSED: u8 = 2;

/// State shared between a trigger handle and its task.
struct Lifecycle {
    state: AtomicU8,
    wake: Notify,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ARMED),
            wake: Notify::new(),
        }
    }

    fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) != CLOSED
    }

    /// ARMED -> FIRING. Fails once closed.
    fn begin_firing(&self) -> bool {
        self.state
            .compare_exchange(ARMED, FIRING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// FIRING -> ARMED. Fails if closed while the handler ran.
    fn rearm(&self) -> bool {
        self.state
            .compare_exchange(FIRING, ARMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns whether this call performed the transition.
    fn close(&self) -> bool {
        if self.state.swap(CLOSED, Ordering::AcqRel) == CLOSED {
            return false;
        }
        // Stores a permit if the task is not waiting yet
        self.wake.notify_one();
        true
    }

    /// Sleep for `delay`. Returns false if woken by `close`.
    async fn wait(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => self.is_running(),
            _ = self.wake.notified() => false,
        }
    }
}

fn runtime() -> Result<Handle> {
    Handle::try_current()
        .map_err(|err| Error::invalid_state("triggers need a tokio runtime").with_context("cause", err))
}
