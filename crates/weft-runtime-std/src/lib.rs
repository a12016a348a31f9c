//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `weft-core`: a [`StdTimerDriver`] running
//! a dedicated timer thread, a [`ThreadDispatcher`] that marshals closures
//! onto an owned render thread, an [`InlineDispatcher`] for single-threaded
//! hosts, and a [`StdClock`] over [`std::time`].

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use weft_core::{Clock, Dispatcher, TimerDriver, TimerHandle};

enum TimerTask {
    Once(Box<dyn FnOnce() + Send>),
    Repeating {
        period: Duration,
        tick: Arc<dyn Fn() + Send + Sync>,
    },
}

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: TimerTask,
}

// BinaryHeap is a max-heap; reverse the ordering so the earliest deadline
// sits on top, with sequence numbers keeping ties FIFO.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

struct TimerQueue {
    entries: BinaryHeap<TimerEntry>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerShared {
    queue: Mutex<TimerQueue>,
    wakeup: Condvar,
}

impl TimerShared {
    fn push(&self, deadline: Instant, cancelled: Arc<AtomicBool>, task: TimerTask) {
        let mut queue = self.queue.lock().unwrap();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.entries.push(TimerEntry {
            deadline,
            seq,
            cancelled,
            task,
        });
        drop(queue);
        self.wakeup.notify_one();
    }
}

/// Timer driver running a dedicated worker thread.
///
/// Entries fire on the worker thread in deadline order. Tasks run outside
/// the queue lock, so a firing task may schedule or cancel other entries.
/// Dropping the driver stops the worker; entries not yet due are discarded.
pub struct StdTimerDriver {
    shared: Arc<TimerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StdTimerDriver {
    pub fn new() -> Self {
        let shared = Arc::new(TimerShared {
            queue: Mutex::new(TimerQueue {
                entries: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("weft-timer".into())
            .spawn(move || run_timer_worker(worker_shared))
            .expect("failed to spawn timer thread");

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }
}

fn run_timer_worker(shared: Arc<TimerShared>) {
    loop {
        let entry = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if queue.shutdown {
                    return;
                }
                while queue
                    .entries
                    .peek()
                    .is_some_and(|entry| entry.cancelled.load(Ordering::SeqCst))
                {
                    queue.entries.pop();
                }
                match queue.entries.peek() {
                    None => {
                        queue = shared.wakeup.wait(queue).unwrap();
                    }
                    Some(next) => {
                        let now = Instant::now();
                        if next.deadline <= now {
                            break;
                        }
                        let timeout = next.deadline - now;
                        let (guard, _) = shared.wakeup.wait_timeout(queue, timeout).unwrap();
                        queue = guard;
                    }
                }
            }
            queue.entries.pop()
        };
        let Some(entry) = entry else { continue };
        if entry.cancelled.load(Ordering::SeqCst) {
            continue;
        }
        match entry.task {
            TimerTask::Once(task) => task(),
            TimerTask::Repeating { period, tick } => {
                shared.push(
                    Instant::now() + period,
                    Arc::clone(&entry.cancelled),
                    TimerTask::Repeating {
                        period,
                        tick: Arc::clone(&tick),
                    },
                );
                tick();
            }
        }
    }
}

impl Default for StdTimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDriver for StdTimerDriver {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send + 'static>) -> TimerHandle {
        let handle = TimerHandle::new();
        self.shared.push(
            Instant::now() + delay,
            handle.cancellation(),
            TimerTask::Once(task),
        );
        handle
    }

    fn schedule_repeating(
        &self,
        period: Duration,
        tick: Box<dyn Fn() + Send + Sync + 'static>,
    ) -> TimerHandle {
        let handle = TimerHandle::new();
        self.shared.push(
            Instant::now() + period,
            handle.cancellation(),
            TimerTask::Repeating {
                period,
                tick: Arc::from(tick),
            },
        );
        handle
    }
}

impl Drop for StdTimerDriver {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.shutdown = true;
        }
        self.wakeup_and_join();
    }
}

impl StdTimerDriver {
    fn wakeup_and_join(&self) {
        self.shared.wakeup.notify_one();
        if let Some(worker) = self.worker.lock().unwrap().take() {
            if worker.join().is_err() {
                log::warn!("timer worker panicked");
            }
        }
    }
}

impl fmt::Debug for StdTimerDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.queue.lock().unwrap();
        f.debug_struct("StdTimerDriver")
            .field("pending", &queue.entries.len())
            .finish()
    }
}

enum DispatchMessage {
    Run(Box<dyn FnOnce() + Send>),
    Shutdown,
}

/// Dispatcher owning a single long-lived execution thread.
///
/// Every dispatched closure runs on that thread in submission order. This is
/// the marshaling point for render callbacks: timers fire on the timer
/// thread, rendering happens here.
pub struct ThreadDispatcher {
    sender: Mutex<Sender<DispatchMessage>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl ThreadDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<DispatchMessage>();
        let worker = thread::Builder::new()
            .name("weft-render".into())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        DispatchMessage::Run(task) => task(),
                        DispatchMessage::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn dispatch thread");
        let thread_id = worker.thread().id();

        Self {
            sender: Mutex::new(sender),
            worker: Mutex::new(Some(worker)),
            thread_id,
        }
    }

    /// Identity of the owned thread, for assertions and reentrancy checks.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl Default for ThreadDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for ThreadDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        let sender = self.sender.lock().unwrap();
        if sender.send(DispatchMessage::Run(task)).is_err() {
            log::warn!("dispatch after shutdown; task dropped");
        }
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        let _ = self
            .sender
            .lock()
            .unwrap()
            .send(DispatchMessage::Shutdown);
        if let Some(worker) = self.worker.lock().unwrap().take() {
            if worker.join().is_err() {
                log::warn!("dispatch worker panicked");
            }
        }
    }
}

impl fmt::Debug for ThreadDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadDispatcher")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

/// Dispatcher that runs closures on the calling thread, for hosts whose
/// timers already fire on the thread that owns the UI.
#[derive(Debug, Default, Clone)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        task();
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed_millis(&self, since: Self::Instant) -> u64 {
        since.elapsed().as_millis() as u64
    }
}

impl StdClock {
    /// Returns the elapsed time as a [`Duration`] for convenience.
    pub fn elapsed(&self, since: Instant) -> Duration {
        since.elapsed()
    }
}
