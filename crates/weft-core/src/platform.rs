//! Platform abstraction traits for Weft runtime services.
//!
//! These traits let the binding engine delegate timing and thread-marshaling
//! to the host, so the core stays free of any particular event loop. The
//! std-backed implementations live in `weft-runtime-std`; virtual-time
//! implementations for tests live in `weft-testing`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Schedules delayed and periodic work.
///
/// Implementations must be safe to call from any thread and must honor
/// cancellation: a cancelled entry whose deadline has already been reached
/// internally must not run its task.
pub trait TimerDriver: Send + Sync {
    /// Run `task` once after `delay`.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send + 'static>) -> TimerHandle;

    /// Run `tick` every `period` until the handle is cancelled.
    fn schedule_repeating(
        &self,
        period: Duration,
        tick: Box<dyn Fn() + Send + Sync + 'static>,
    ) -> TimerHandle;
}

/// Cancellation handle for a scheduled timer entry.
///
/// Cancellation is idempotent and safe to race with an in-flight firing; the
/// driver rechecks the flag before running the task. Dropping the handle
/// does not cancel.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The shared cancellation flag, for driver implementations to store
    /// alongside their queue entries.
    pub fn cancellation(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Marshals closures onto a single designated execution thread.
///
/// The render scheduler captures an optional dispatcher at construction so
/// that render callbacks always run on one thread regardless of which thread
/// triggered the invalidation.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send + 'static>);
}

/// Provides timing information for the runtime.
pub trait Clock: Send + Sync {
    type Instant: Copy + Send + Sync;

    fn now(&self) -> Self::Instant;

    fn elapsed_millis(&self, since: Self::Instant) -> u64;
}
