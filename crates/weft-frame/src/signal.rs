//! Edge-triggered events with RAII connections.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Listener = dyn Fn() + Send + Sync;

struct SignalInner {
    listeners: Mutex<Vec<(u64, Arc<Listener>)>>,
    next_id: AtomicU64,
}

/// A parameterless event. Listeners are invoked outside the internal lock,
/// so a listener may connect or disconnect freely. Cloning shares the
/// listener list.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn connect(&self, listener: impl Fn() + Send + Sync + 'static) -> SignalGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        SignalGuard {
            signal: Arc::downgrade(&self.inner),
            id,
            detached: AtomicBool::new(false),
        }
    }

    pub fn emit(&self) {
        let snapshot: Vec<Arc<Listener>> = {
            let listeners = self.inner.listeners.lock().unwrap();
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in snapshot {
            listener();
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.listeners.lock().unwrap().len()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .finish()
    }
}

/// Disconnects its listener on [`detach`](Self::detach) or drop; both are
/// idempotent.
pub struct SignalGuard {
    signal: Weak<SignalInner>,
    id: u64,
    detached: AtomicBool,
}

impl SignalGuard {
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(signal) = self.signal.upgrade() {
            signal
                .listeners
                .lock()
                .unwrap()
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.detach();
    }
}
