//! Merging of render-need sources into a single boolean with an edge event.
//!
//! Two kinds of need feed the aggregator: a one-shot manual request (cleared
//! after the next rendered frame) and registered [`Invalidator`] reporters
//! such as running animations. Reporter-internal flips are debounced with a
//! single-slot trailing-edge timer so a burst of changes inside one frame
//! window evaluates once; structural register/unregister and the manual flag
//! re-evaluate synchronously.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use weft_core::{TimerDriver, TimerHandle};

use crate::signal::{Signal, SignalGuard};

/// Debounce window for reporter state flips, on the order of one frame.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(16);

/// A feature that needs continuous rendering while active, e.g. an
/// in-progress animation. Implementors flip `needs_rendering` and emit
/// `invalidation_changed` on every flip.
pub trait Invalidator: Send + Sync + 'static {
    fn needs_rendering(&self) -> bool;

    fn invalidation_changed(&self) -> &Signal;
}

struct Registration {
    reporter: Arc<dyn Invalidator>,
    _guard: SignalGuard,
}

struct AggregatorInner {
    reporters: Mutex<Vec<Registration>>,
    manual: AtomicBool,
    /// Last evaluated value, for edge detection.
    last: AtomicBool,
    changed: Signal,
    timer: Arc<dyn TimerDriver>,
    debounce: Mutex<Option<TimerHandle>>,
}

impl AggregatorInner {
    fn evaluate(&self) -> bool {
        if self.manual.load(Ordering::SeqCst) {
            return true;
        }
        let reporters = self.reporters.lock().unwrap();
        reporters
            .iter()
            .any(|registration| registration.reporter.needs_rendering())
    }

    fn reevaluate(&self) {
        let now = self.evaluate();
        let was = self.last.swap(now, Ordering::SeqCst);
        if was != now {
            log::trace!("rendering required changed: {now}");
            self.changed.emit();
        }
    }

    /// Restart the single-slot debounce timer. Intermediate states within
    /// the window are dropped; only the final state is evaluated.
    fn schedule_reevaluate(self: &Arc<Self>) {
        let mut slot = self.debounce.lock().unwrap();
        if let Some(pending) = slot.take() {
            pending.cancel();
        }
        let weak = Arc::downgrade(self);
        let handle = self.timer.schedule(
            DEBOUNCE_WINDOW,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.debounce.lock().unwrap().take();
                    inner.reevaluate();
                }
            }),
        );
        *slot = Some(handle);
    }
}

/// Process-wide answer to "does anything need rendering right now".
///
/// One instance per running application, created at startup and handed by
/// clone to every reporter site and to the scheduler. Cloning shares state.
#[derive(Clone)]
pub struct InvalidationAggregator {
    inner: Arc<AggregatorInner>,
}

impl InvalidationAggregator {
    pub fn new(timer: Arc<dyn TimerDriver>) -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                reporters: Mutex::new(Vec::new()),
                manual: AtomicBool::new(false),
                last: AtomicBool::new(false),
                changed: Signal::new(),
                timer,
                debounce: Mutex::new(None),
            }),
        }
    }

    /// `manual-flag OR any(reporter.needs_rendering)`, evaluated fresh.
    pub fn needs_render(&self) -> bool {
        self.inner.evaluate()
    }

    /// Fires whenever `needs_render` flips in either direction.
    pub fn rendering_required_changed(&self) -> &Signal {
        &self.inner.changed
    }

    /// Request a single frame. Self-clears after the next call to
    /// [`frame_rendered`](Self::frame_rendered).
    pub fn request_render(&self) {
        self.inner.manual.store(true, Ordering::SeqCst);
        self.inner.reevaluate();
    }

    /// Called by the platform once per actual render. Clears the one-shot
    /// flag; a still-active reporter keeps `needs_render` true.
    pub fn frame_rendered(&self) {
        self.inner.manual.store(false, Ordering::SeqCst);
        self.inner.reevaluate();
    }

    /// Add a continuous-need reporter and re-evaluate synchronously.
    pub fn register(&self, reporter: Arc<dyn Invalidator>) {
        let weak = Arc::downgrade(&self.inner);
        let guard = reporter.invalidation_changed().connect(move || {
            if let Some(inner) = weak.upgrade() {
                inner.schedule_reevaluate();
            }
        });
        self.inner.reporters.lock().unwrap().push(Registration {
            reporter,
            _guard: guard,
        });
        self.inner.reevaluate();
    }

    /// Remove a reporter (by identity) and re-evaluate synchronously.
    /// Effective immediately for future notifications; an in-flight debounce
    /// evaluation simply no longer sees the reporter.
    pub fn unregister(&self, reporter: &Arc<dyn Invalidator>) {
        {
            let mut reporters = self.inner.reporters.lock().unwrap();
            reporters.retain(|registration| !Arc::ptr_eq(&registration.reporter, reporter));
        }
        self.inner.reevaluate();
    }

    pub fn reporter_count(&self) -> usize {
        self.inner.reporters.lock().unwrap().len()
    }
}

impl std::fmt::Debug for InvalidationAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationAggregator")
            .field("needs_render", &self.needs_render())
            .field("reporters", &self.reporter_count())
            .finish()
    }
}
