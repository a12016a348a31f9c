//! Live subscription tracking along a property path.
//!
//! A [`PathBinding`] walks the object graph from a root, subscribing at
//! every traversable segment. When an interior segment reports a change, the
//! object below it may have been replaced wholesale, so the chain suffix
//! from that depth down is detached, re-resolved against the current value,
//! and re-subscribed before the change callback runs. The chain therefore
//! always mirrors the live graph: stale subscriptions to replaced sub-objects
//! are never retained, and replacements are picked up exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::observe::{ChangeGuard, Observable, PropertyValue};
use crate::path::PropertyPath;

type ChangeAction = dyn Fn() + Send + Sync;

struct ChainLink {
    object: Arc<dyn Observable>,
    /// `None` when the object at this depth has no change source; it is
    /// still traversed for value reads.
    guard: Option<ChangeGuard>,
}

struct ChainState {
    root: Option<Arc<dyn Observable>>,
    links: Vec<ChainLink>,
}

struct BindingInner {
    path: PropertyPath,
    on_changed: Arc<ChangeAction>,
    state: Mutex<ChainState>,
    disposed: AtomicBool,
}

/// Tracks subscriptions along one [`PropertyPath`] against a live root.
pub struct PathBinding {
    inner: Arc<BindingInner>,
}

impl PathBinding {
    /// Create a binding for `path` whose `on_changed` runs whenever any
    /// segment of the path reports a relevant change. An empty path is a
    /// constant binding: `set_root` wires nothing and the callback never
    /// fires.
    pub fn new(path: PropertyPath, on_changed: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(BindingInner {
                path,
                on_changed: Arc::new(on_changed),
                state: Mutex::new(ChainState {
                    root: None,
                    links: Vec::new(),
                }),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn path(&self) -> &PropertyPath {
        &self.inner.path
    }

    /// Retarget the binding: detach the whole chain and re-walk from
    /// `root`. Passing `None` detaches without re-walking.
    pub fn set_root(&self, root: Option<Arc<dyn Observable>>) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            log::warn!(
                "set_root on disposed path binding {} ignored",
                self.inner.path
            );
            return;
        }
        let mut state = self.inner.state.lock().unwrap();
        state.root = root;
        rebuild_from(&self.inner, &mut state, 0);
    }

    /// Detach every subscription. Idempotent; in-flight notifications
    /// observing the disposed flag become no-ops.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.inner.state.lock().unwrap();
        detach_from(&mut state, 0);
        state.root = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of live change subscriptions held by the chain. Diagnostic;
    /// used to verify that repeated replacements never accumulate.
    pub fn active_subscriptions(&self) -> usize {
        let state = self.inner.state.lock().unwrap();
        state
            .links
            .iter()
            .filter(|link| link.guard.is_some())
            .count()
    }

    /// Depth of the chain actually wired, which may be shorter than the
    /// path when an interior segment currently resolves to null.
    pub fn chain_depth(&self) -> usize {
        self.inner.state.lock().unwrap().links.len()
    }
}

impl Drop for PathBinding {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for PathBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathBinding")
            .field("path", &self.inner.path)
            .field("depth", &self.chain_depth())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn detach_from(state: &mut ChainState, depth: usize) {
    for link in state.links.drain(depth..) {
        if let Some(guard) = link.guard {
            guard.detach();
        }
    }
}

/// Rewire the chain from `depth` downward against the current object graph.
/// Caller holds the state lock, which makes resubscription atomic with
/// respect to this binding.
fn rebuild_from(inner: &Arc<BindingInner>, state: &mut ChainState, depth: usize) {
    // A stale notification may race a retarget that already shortened the
    // chain below this depth; there is nothing left to rewire from.
    if depth > state.links.len() {
        return;
    }
    detach_from(state, depth);

    let mut current: Option<Arc<dyn Observable>> = if depth == 0 {
        state.root.clone()
    } else {
        let parent = &state.links[depth - 1];
        let segment = inner
            .path
            .segment(depth - 1)
            .expect("chain depth within path");
        parent.object.read(segment).as_object()
    };

    let mut index = depth;
    while index < inner.path.len() {
        let Some(object) = current.take() else { break };
        let guard = object.changes().map(|source| {
            let weak = Arc::downgrade(inner);
            source.subscribe(move |property| on_segment_changed(&weak, index, property))
        });
        let next = if inner.path.is_leaf(index) {
            None
        } else {
            let segment = inner.path.segment(index).expect("index within path");
            object.read(segment).as_object()
        };
        state.links.push(ChainLink { object, guard });
        current = next;
        index += 1;
    }

    log::trace!(
        "path {} wired to depth {} (from {})",
        inner.path,
        state.links.len(),
        depth
    );
}

fn on_segment_changed(weak: &Weak<BindingInner>, index: usize, property: &str) {
    // A notification referencing a just-disposed binding must fail safe.
    let Some(inner) = weak.upgrade() else { return };
    if inner.disposed.load(Ordering::SeqCst) {
        return;
    }
    // The observed object may expose unrelated properties; only the name
    // expected at this depth matters.
    if inner.path.segment(index) != Some(property) {
        return;
    }

    if !inner.path.is_leaf(index) {
        // The object below this depth may have changed identity; the whole
        // suffix must be rewired before dependents observe the new value.
        let mut state = inner.state.lock().unwrap();
        rebuild_from(&inner, &mut state, index + 1);
    }
    // Invoke outside the lock so the callback may read back through the
    // graph or retarget other bindings.
    (inner.on_changed)();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::ChangeSource;
    use std::sync::atomic::AtomicUsize;

    use crate::collections::map::HashMap;

    /// Minimal observable property bag for exercising the tracker.
    struct Bag {
        properties: Mutex<HashMap<String, PropertyValue>>,
        changes: Option<ChangeSource>,
    }

    impl Bag {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                properties: Mutex::new(HashMap::default()),
                changes: Some(ChangeSource::new()),
            })
        }

        fn silent() -> Arc<Self> {
            Arc::new(Self {
                properties: Mutex::new(HashMap::default()),
                changes: None,
            })
        }

        fn set(&self, name: &str, value: PropertyValue) {
            self.properties
                .lock()
                .unwrap()
                .insert(name.to_string(), value);
            if let Some(changes) = &self.changes {
                changes.notify(name);
            }
        }

        fn subscriber_count(&self) -> usize {
            self.changes
                .as_ref()
                .map(ChangeSource::subscriber_count)
                .unwrap_or(0)
        }
    }

    impl Observable for Bag {
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

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        (count, move || {
            sink.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn leaf_change_invokes_callback_without_rewiring() {
        let root = Bag::new();
        root.set("Name", PropertyValue::data(String::from("A")));

        let (hits, on_changed) = counter();
        let binding = PathBinding::new(PropertyPath::new(["Name"]), on_changed);
        binding.set_root(Some(root.clone()));
        assert_eq!(binding.active_subscriptions(), 1);

        root.set("Name", PropertyValue::data(String::from("B")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(binding.active_subscriptions(), 1);
    }

    #[test]
    fn interior_replacement_resubscribes_and_fires_once() {
        let root = Bag::new();
        let level1 = Bag::new();
        let level2 = Bag::new();
        level2.set("Value", PropertyValue::data(1i32));
        level1.set("Level2", PropertyValue::object(level2.clone()));
        root.set("Level1", PropertyValue::object(level1.clone()));

        let (hits, on_changed) = counter();
        let binding = PathBinding::new(
            PropertyPath::new(["Level1", "Level2", "Value"]),
            on_changed,
        );
        binding.set_root(Some(root.clone()));
        assert_eq!(binding.chain_depth(), 3);
        assert_eq!(level1.subscriber_count(), 1);
        assert_eq!(level2.subscriber_count(), 1);

        // Replace Level1 with a whole new subtree.
        let new_level2 = Bag::new();
        new_level2.set("Value", PropertyValue::data(2i32));
        let new_level1 = Bag::new();
        new_level1.set("Level2", PropertyValue::object(new_level2.clone()));
        hits.store(0, Ordering::SeqCst);
        root.set("Level1", PropertyValue::object(new_level1.clone()));

        assert_eq!(hits.load(Ordering::SeqCst), 1, "one callback per replacement");
        assert_eq!(level1.subscriber_count(), 0, "old subtree detached");
        assert_eq!(level2.subscriber_count(), 0);
        assert_eq!(new_level1.subscriber_count(), 1);
        assert_eq!(new_level2.subscriber_count(), 1);

        // The new leaf is live.
        hits.store(0, Ordering::SeqCst);
        new_level2.set("Value", PropertyValue::data(3i32));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ten_replacements_leave_exactly_one_chain() {
        let root = Bag::new();
        let (_, on_changed) = counter();
        let binding = PathBinding::new(PropertyPath::new(["Level1", "Value"]), on_changed);

        let mut last = Bag::new();
        root.set("Level1", PropertyValue::object(last.clone()));
        binding.set_root(Some(root.clone()));

        for _ in 0..10 {
            let replacement = Bag::new();
            root.set("Level1", PropertyValue::object(replacement.clone()));
            assert_eq!(last.subscriber_count(), 0);
            assert_eq!(replacement.subscriber_count(), 1);
            last = replacement;
        }
        assert_eq!(binding.active_subscriptions(), 2);
        assert_eq!(root.subscriber_count(), 1);
    }

    #[test]
    fn null_interior_segment_shortens_chain() {
        let root = Bag::new();
        root.set("Level1", PropertyValue::Null);

        let (hits, on_changed) = counter();
        let binding = PathBinding::new(PropertyPath::new(["Level1", "Value"]), on_changed);
        binding.set_root(Some(root.clone()));
        assert_eq!(binding.chain_depth(), 1, "walk stops at the null segment");

        // The value becoming non-null via the tracked segment repairs the
        // chain and fires the callback.
        let level1 = Bag::new();
        level1.set("Value", PropertyValue::data(5i32));
        root.set("Level1", PropertyValue::object(level1.clone()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(binding.chain_depth(), 2);
        assert_eq!(level1.subscriber_count(), 1);
    }

    #[test]
    fn silent_object_is_traversed_without_subscription() {
        let root = Bag::new();
        let quiet = Bag::silent();
        let leaf = Bag::new();
        leaf.set("Value", PropertyValue::data(1i32));
        quiet.set("Inner", PropertyValue::object(leaf.clone()));
        root.set("Quiet", PropertyValue::object(quiet.clone()));

        let (hits, on_changed) = counter();
        let binding = PathBinding::new(PropertyPath::new(["Quiet", "Inner", "Value"]), on_changed);
        binding.set_root(Some(root));

        assert_eq!(binding.chain_depth(), 3);
        assert_eq!(binding.active_subscriptions(), 2, "silent level has no guard");

        leaf.set("Value", PropertyValue::data(2i32));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unrelated_property_names_are_ignored() {
        let root = Bag::new();
        root.set("Name", PropertyValue::data(1i32));

        let (hits, on_changed) = counter();
        let binding = PathBinding::new(PropertyPath::new(["Name"]), on_changed);
        binding.set_root(Some(root.clone()));

        root.set("Other", PropertyValue::data(2i32));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispose_is_idempotent_and_detaches() {
        let root = Bag::new();
        root.set("Name", PropertyValue::data(1i32));

        let (hits, on_changed) = counter();
        let binding = PathBinding::new(PropertyPath::new(["Name"]), on_changed);
        binding.set_root(Some(root.clone()));
        assert_eq!(root.subscriber_count(), 1);

        binding.dispose();
        binding.dispose();
        assert_eq!(root.subscriber_count(), 0);

        root.set("Name", PropertyValue::data(2i32));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // Retargeting a disposed binding is ignored.
        binding.set_root(Some(root.clone()));
        assert_eq!(root.subscriber_count(), 0);
    }

    #[test]
    fn drop_detaches_chain() {
        let root = Bag::new();
        root.set("Name", PropertyValue::data(1i32));
        {
            let binding = PathBinding::new(PropertyPath::new(["Name"]), || {});
            binding.set_root(Some(root.clone()));
            assert_eq!(root.subscriber_count(), 1);
        }
        assert_eq!(root.subscriber_count(), 0);
    }

    #[test]
    fn set_root_retargets_to_new_root() {
        let first = Bag::new();
        let second = Bag::new();
        first.set("Name", PropertyValue::data(1i32));
        second.set("Name", PropertyValue::data(2i32));

        let (hits, on_changed) = counter();
        let binding = PathBinding::new(PropertyPath::new(["Name"]), on_changed);
        binding.set_root(Some(first.clone()));
        binding.set_root(Some(second.clone()));
        assert_eq!(first.subscriber_count(), 0);
        assert_eq!(second.subscriber_count(), 1);

        first.set("Name", PropertyValue::data(3i32));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        second.set("Name", PropertyValue::data(3i32));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_path_wires_nothing() {
        let root = Bag::new();
        let binding = PathBinding::new(PropertyPath::empty(), || {});
        binding.set_root(Some(root.clone()));
        assert_eq!(binding.chain_depth(), 0);
        assert_eq!(root.subscriber_count(), 0);
    }
}
