//! Deterministic stand-ins for the runtime services.
//!
//! [`ManualTimerDriver`] replaces wall-clock timers with virtual time so
//! debounce and scheduler behavior can be stepped exactly;
//! [`CountingDispatcher`] runs marshaled work inline while recording it;
//! [`TestReporter`] is a scriptable continuous-need source; [`TestModel`] is
//! an observable property bag for building bindable object graphs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use weft_core::collections::map::HashMap;
use weft_core::{
    ChangeSource, Dispatcher, Observable, PropertyValue, TimerDriver, TimerHandle,
};
use weft_frame::{Invalidator, Signal};

enum ManualTask {
    Once(Option<Box<dyn FnOnce() + Send>>),
    Repeating {
        period: Duration,
        tick: Arc<dyn Fn() + Send + Sync>,
    },
}

struct ManualEntry {
    deadline: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: ManualTask,
}

struct ManualState {
    now: Duration,
    entries: Vec<ManualEntry>,
    next_seq: u64,
}

/// A [`TimerDriver`] over virtual time. Nothing fires until
/// [`advance`](Self::advance) moves the clock; due entries then fire in
/// deadline order (FIFO for ties), outside the internal lock, so a firing
/// task may schedule or cancel freely.
pub struct ManualTimerDriver {
    state: Mutex<ManualState>,
    one_shot_count: AtomicUsize,
    repeating_count: AtomicUsize,
}

impl ManualTimerDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Duration::ZERO,
                entries: Vec::new(),
                next_seq: 0,
            }),
            one_shot_count: AtomicUsize::new(0),
            repeating_count: AtomicUsize::new(0),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().unwrap().now
    }

    /// Number of live (non-cancelled) entries in the queue.
    pub fn pending(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .filter(|entry| !entry.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Total one-shot `schedule` calls observed.
    pub fn one_shot_count(&self) -> usize {
        self.one_shot_count.load(Ordering::SeqCst)
    }

    /// Total `schedule_repeating` calls observed; the scheduler's arm count.
    pub fn repeating_count(&self) -> usize {
        self.repeating_count.load(Ordering::SeqCst)
    }

    /// Move virtual time forward by `delta`, firing every due entry.
    /// Repeating entries fire as many times as their period fits.
    pub fn advance(&self, delta: Duration) {
        let target = {
            let state = self.state.lock().unwrap();
            state.now + delta
        };

        loop {
            let fired = self.fire_next_due(target);
            if !fired {
                break;
            }
        }

        let mut state = self.state.lock().unwrap();
        if state.now < target {
            state.now = target;
        }
    }

    fn fire_next_due(&self, target: Duration) -> bool {
        let runnable: Box<dyn FnOnce()> = {
            let mut state = self.state.lock().unwrap();
            state
                .entries
                .retain(|entry| !entry.cancelled.load(Ordering::SeqCst));

            let due = state
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.deadline <= target)
                .min_by_key(|(_, entry)| (entry.deadline, entry.seq))
                .map(|(index, _)| index);
            let Some(index) = due else { return false };

            let deadline = state.entries[index].deadline;
            if state.now < deadline {
                state.now = deadline;
            }

            match &mut state.entries[index].task {
                ManualTask::Once(slot) => {
                    let task = slot.take();
                    state.entries.remove(index);
                    match task {
                        Some(task) => Box::new(task),
                        None => return false,
                    }
                }
                ManualTask::Repeating { period, tick } => {
                    let tick = Arc::clone(tick);
                    let period = *period;
                    assert!(!period.is_zero(), "repeating timer needs a nonzero period");
                    state.entries[index].deadline = deadline + period;
                    Box::new(move || tick())
                }
            }
        };
        runnable();
        true
    }
}

impl Default for ManualTimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDriver for ManualTimerDriver {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send + 'static>) -> TimerHandle {
        self.one_shot_count.fetch_add(1, Ordering::SeqCst);
        let handle = TimerHandle::new();
        let mut state = self.state.lock().unwrap();
        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = state.now + delay;
        state.entries.push(ManualEntry {
            deadline,
            seq,
            cancelled: handle.cancellation(),
            task: ManualTask::Once(Some(task)),
        });
        handle
    }

    fn schedule_repeating(
        &self,
        period: Duration,
        tick: Box<dyn Fn() + Send + Sync + 'static>,
    ) -> TimerHandle {
        self.repeating_count.fetch_add(1, Ordering::SeqCst);
        let handle = TimerHandle::new();
        let mut state = self.state.lock().unwrap();
        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = state.now + period;
        state.entries.push(ManualEntry {
            deadline,
            seq,
            cancelled: handle.cancellation(),
            task: ManualTask::Repeating {
                period,
                tick: Arc::from(tick),
            },
        });
        handle
    }
}

/// Runs dispatched work inline on the calling thread while counting it.
pub struct CountingDispatcher {
    dispatched: AtomicUsize,
}

impl CountingDispatcher {
    pub fn new() -> Self {
        Self {
            dispatched: AtomicUsize::new(0),
        }
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

impl Default for CountingDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for CountingDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        task();
    }
}

/// A scriptable continuous-need reporter.
pub struct TestReporter {
    needs: AtomicBool,
    changed: Signal,
}

impl TestReporter {
    pub fn new() -> Self {
        Self {
            needs: AtomicBool::new(false),
            changed: Signal::new(),
        }
    }

    /// Flip the reported state, emitting the change event when the value
    /// actually changes.
    pub fn set_needs_rendering(&self, needs: bool) {
        if self.needs.swap(needs, Ordering::SeqCst) != needs {
            self.changed.emit();
        }
    }

    /// Emit the change event without flipping state, for exercising
    /// coalescing of redundant notifications.
    pub fn pulse(&self) {
        self.changed.emit();
    }
}

impl Default for TestReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Invalidator for TestReporter {
    fn needs_rendering(&self) -> bool {
        self.needs.load(Ordering::SeqCst)
    }

    fn invalidation_changed(&self) -> &Signal {
        &self.changed
    }
}

/// An observable property bag: the building block for bindable view-model
/// graphs in tests. Setters notify through the model's change source;
/// [`silent`](Self::silent) builds a traversable model with no source.
pub struct TestModel {
    properties: Mutex<HashMap<String, PropertyValue>>,
    changes: Option<ChangeSource>,
}

impl TestModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            properties: Mutex::new(HashMap::default()),
            changes: Some(ChangeSource::new()),
        })
    }

    /// A model that can be traversed for reads but never notifies.
    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            properties: Mutex::new(HashMap::default()),
            changes: None,
        })
    }

    pub fn set_object(&self, name: &str, object: Arc<dyn Observable>) {
        self.store(name, PropertyValue::object(object));
    }

    pub fn set_value<T: std::any::Any + Send + Sync>(&self, name: &str, value: T) {
        self.store(name, PropertyValue::data(value));
    }

    pub fn set_null(&self, name: &str) {
        self.store(name, PropertyValue::Null);
    }

    pub fn value<T: std::any::Any + Send + Sync + Clone>(&self, name: &str) -> Option<T> {
        self.read(name).downcast::<T>().map(|arc| (*arc).clone())
    }

    pub fn object(&self, name: &str) -> Option<Arc<dyn Observable>> {
        self.read(name).as_object()
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes
            .as_ref()
            .map(ChangeSource::subscriber_count)
            .unwrap_or(0)
    }

    fn store(&self, name: &str, value: PropertyValue) {
        self.properties
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
        if let Some(changes) = &self.changes {
            changes.notify(name);
        }
    }
}

impl Observable for TestModel {
    fn read(&self, property: &str) -> PropertyValue {
        self.properties
            .lock()
            .unwrap()
            .get(property)
            .cloned()
            .unwrap_or(PropertyValue::Null)
    }

    fn changes(&self) -> Option<&ChangeSource> {
        self.changes.as_ref()
    }
}
