//! Frame-loop scheduling driven by aggregated render need.
//!
//! The scheduler has exactly two states. `Idle`: no timer armed. `Running`:
//! a repeating timer at the frame interval. Transitions happen only through
//! the aggregator's edge event, never by polling, so an idle application
//! costs nothing. Each tick re-checks need before emitting, which makes an
//! in-flight tick after disarm a harmless no-op.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use weft_core::{Dispatcher, TimerDriver, TimerHandle};

use crate::aggregate::InvalidationAggregator;
use crate::signal::{Signal, SignalGuard};

/// Target frame period: 60 ticks per second.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

struct SchedulerInner {
    aggregator: InvalidationAggregator,
    timer: Arc<dyn TimerDriver>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    render_requested: Signal,
    /// `Some` while running. The mutex is the state machine: arm and disarm
    /// are serialized, so rapid needed/idle/needed flutter cannot double-arm.
    running: Mutex<Option<TimerHandle>>,
}

/// Drives render callbacks while the aggregator reports need.
///
/// Platform code connects to [`render_requested`](Self::render_requested),
/// performs the draw, and then calls
/// [`InvalidationAggregator::frame_rendered`] so the one-shot flag clears.
/// Render callbacks are marshaled onto the dispatcher captured at
/// construction; with no dispatcher they run on the timer thread.
pub struct RenderScheduler {
    inner: Arc<SchedulerInner>,
    _aggregator_guard: SignalGuard,
}

impl RenderScheduler {
    pub fn new(
        aggregator: InvalidationAggregator,
        timer: Arc<dyn TimerDriver>,
        dispatcher: Option<Arc<dyn Dispatcher>>,
    ) -> Self {
        let inner = Arc::new(SchedulerInner {
            aggregator,
            timer,
            dispatcher,
            render_requested: Signal::new(),
            running: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let guard = inner
            .aggregator
            .rendering_required_changed()
            .connect(move || {
                if let Some(inner) = weak.upgrade() {
                    sync_state(&inner);
                }
            });

        // The aggregator may already report need at construction.
        sync_state(&inner);

        Self {
            inner,
            _aggregator_guard: guard,
        }
    }

    pub fn render_requested(&self) -> &Signal {
        &self.inner.render_requested
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.lock().unwrap().is_some()
    }

    /// Disarm and disconnect. Safe to call multiple times; an in-flight tick
    /// re-checks need and no-ops.
    pub fn shutdown(&self) {
        self._aggregator_guard.detach();
        disarm(&self.inner);
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("running", &self.is_running())
            .finish()
    }
}

fn sync_state(inner: &Arc<SchedulerInner>) {
    let needed = inner.aggregator.needs_render();
    let mut running = inner.running.lock().unwrap();
    match (needed, running.is_some()) {
        (true, false) => {
            let weak = Arc::downgrade(inner);
            let handle = inner.timer.schedule_repeating(
                FRAME_INTERVAL,
                Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        tick(&inner);
                    }
                }),
            );
            *running = Some(handle);
            log::trace!("render scheduler armed");
        }
        (false, true) => {
            if let Some(handle) = running.take() {
                handle.cancel();
            }
            log::trace!("render scheduler disarmed");
        }
        _ => {}
    }
}

fn disarm(inner: &Arc<SchedulerInner>) {
    let mut running = inner.running.lock().unwrap();
    if let Some(handle) = running.take() {
        handle.cancel();
    }
}

fn tick(inner: &Arc<SchedulerInner>) {
    // Need may have gone false between arming and this tick.
    if !inner.aggregator.needs_render() {
        return;
    }
    let signal = inner.render_requested.clone();
    match &inner.dispatcher {
        Some(dispatcher) => dispatcher.dispatch(Box::new(move || signal.emit())),
        None => signal.emit(),
    }
}
