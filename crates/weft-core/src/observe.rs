//! Change-notification primitives for bound object graphs.
//!
//! Anything a path can traverse implements [`Observable`]: a named property
//! read plus an optional [`ChangeSource`]. Objects without a change source
//! are still traversable for value reads; they simply never originate
//! notifications on their own, so only an ancestor segment replacing them
//! refreshes the read.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// The value of a named property on an [`Observable`].
#[derive(Clone)]
pub enum PropertyValue {
    /// Missing or currently unset. An interior segment resolving to `Null`
    /// terminates the subscription chain early; this is a steady-state
    /// condition, not an error.
    Null,
    /// An intermediate object that can be traversed further.
    Object(Arc<dyn Observable>),
    /// A leaf value, opaque to the traversal machinery.
    Data(Arc<dyn Any + Send + Sync>),
}

impl PropertyValue {
    pub fn data<T: Any + Send + Sync>(value: T) -> Self {
        PropertyValue::Data(Arc::new(value))
    }

    pub fn object(value: Arc<dyn Observable>) -> Self {
        PropertyValue::Object(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_object(&self) -> Option<Arc<dyn Observable>> {
        match self {
            PropertyValue::Object(object) => Some(Arc::clone(object)),
            _ => None,
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            PropertyValue::Data(data) => Arc::clone(data).downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => f.write_str("Null"),
            PropertyValue::Object(_) => f.write_str("Object(..)"),
            PropertyValue::Data(_) => f.write_str("Data(..)"),
        }
    }
}

/// A node in a bindable object graph.
pub trait Observable: Send + Sync + 'static {
    /// Read the property named `property`. Unknown names return
    /// [`PropertyValue::Null`].
    fn read(&self, property: &str) -> PropertyValue;

    /// The object's change source, if it supports notifications. The default
    /// is `None`: traversable but silent.
    fn changes(&self) -> Option<&ChangeSource> {
        None
    }
}

type ChangeCallback = dyn Fn(&str) + Send + Sync;

struct SourceInner {
    subscribers: Mutex<Vec<(u64, Arc<ChangeCallback>)>>,
    next_id: AtomicU64,
}

/// A list of property-change subscribers.
///
/// Notifications may arrive from any thread; the subscriber list is
/// snapshotted under the lock and callbacks are invoked outside it, so a
/// callback may freely subscribe or detach without deadlocking.
pub struct ChangeSource {
    inner: Arc<SourceInner>,
}

impl ChangeSource {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SourceInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `callback` to run on every notification, receiving the name
    /// of the property that changed. Detach the returned guard (or drop it)
    /// to unsubscribe.
    pub fn subscribe(&self, callback: impl Fn(&str) + Send + Sync + 'static) -> ChangeGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));
        ChangeGuard {
            source: Arc::downgrade(&self.inner),
            id,
            detached: AtomicBool::new(false),
        }
    }

    /// Notify every subscriber that `property` changed.
    pub fn notify(&self, property: &str) {
        let snapshot: Vec<Arc<ChangeCallback>> = {
            let subscribers = self.inner.subscribers.lock().unwrap();
            subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in snapshot {
            callback(property);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().unwrap().len()
    }
}

impl Default for ChangeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSource")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Detach handle for a single subscription.
///
/// `detach` is idempotent and never panics: resubscription logic detaches
/// ranges of the chain that may already be partially torn down. Dropping the
/// guard detaches as well.
pub struct ChangeGuard {
    source: Weak<SourceInner>,
    id: u64,
    detached: AtomicBool,
}

impl ChangeGuard {
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(source) = self.source.upgrade() {
            source
                .subscribers
                .lock()
                .unwrap()
                .retain(|(id, _)| *id != self.id);
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

impl Drop for ChangeGuard {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for ChangeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeGuard")
            .field("id", &self.id)
            .field("detached", &self.is_detached())
            .finish()
    }
}
