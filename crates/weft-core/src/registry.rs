//! Per-node fan-out of property notifications to update actions.
//!
//! A UI node owns one [`BindingRegistry`]. Its property setters call
//! [`BindingRegistry::notify`] with the property name; every action
//! registered under that exact key runs. Deep paths compose with
//! [`PathBinding`]: the action fires on any path change and is additionally
//! keyed under the path's root segment, so a container's bulk notify sweep
//! on the root name still reaches nested bindings.

use std::sync::{Arc, Mutex};

use crate::collections::map::HashMap;
use crate::observe::Observable;
use crate::path::PropertyPath;
use crate::tracker::PathBinding;

type UpdateAction = Arc<dyn Fn() + Send + Sync>;

struct RegistryInner {
    actions: Mutex<HashMap<String, Vec<UpdateAction>>>,
    paths: Mutex<Vec<PathBinding>>,
}

/// Name-keyed multimap of update actions, with a path-based variant.
///
/// Actions under one key run in registration order on each notify, but no
/// ordering is guaranteed across keys or relied upon by callers; actions
/// must be idempotent and write only into the owning node's own state.
pub struct BindingRegistry {
    inner: Arc<RegistryInner>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                actions: Mutex::new(HashMap::default()),
                paths: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register `action` under `key` and invoke it once immediately so the
    /// node reflects current state.
    pub fn register(&self, key: impl Into<String>, action: impl Fn() + Send + Sync + 'static) {
        let action: UpdateAction = Arc::new(action);
        self.inner
            .actions
            .lock()
            .unwrap()
            .entry(key.into())
            .or_default()
            .push(Arc::clone(&action));
        action();
    }

    /// Fan out to every action registered under exactly `key`. Unknown keys
    /// are a no-op.
    pub fn notify(&self, key: &str) {
        let snapshot: Vec<UpdateAction> = {
            let actions = self.inner.actions.lock().unwrap();
            match actions.get(key) {
                Some(list) => list.clone(),
                None => {
                    log::trace!("notify({key}) had no registered actions");
                    return;
                }
            }
        };
        for action in snapshot {
            action();
        }
    }

    /// Register `action` against a deep `path` rooted at `root`. The action
    /// runs once immediately, then on every change anywhere along the path,
    /// and also on `notify` of the path's root segment name. The registry
    /// owns the underlying subscription chain until [`clear`](Self::clear)
    /// or drop.
    ///
    /// An empty path is a constant binding: the action runs once and nothing
    /// is tracked.
    pub fn register_path(
        &self,
        path: PropertyPath,
        root: Option<Arc<dyn Observable>>,
        action: impl Fn() + Send + Sync + 'static,
    ) {
        let action: UpdateAction = Arc::new(action);
        if path.is_empty() {
            action();
            return;
        }

        let root_key = path.first().expect("non-empty path").to_string();
        self.inner
            .actions
            .lock()
            .unwrap()
            .entry(root_key)
            .or_default()
            .push(Arc::clone(&action));

        let tracked = Arc::clone(&action);
        let binding = PathBinding::new(path, move || tracked());
        binding.set_root(root);
        self.inner.paths.lock().unwrap().push(binding);

        action();
    }

    /// Number of actions registered under `key`.
    pub fn action_count(&self, key: &str) -> usize {
        self.inner
            .actions
            .lock()
            .unwrap()
            .get(key)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn path_count(&self) -> usize {
        self.inner.paths.lock().unwrap().len()
    }

    /// Tear down: drop every action and dispose every path subscription.
    /// Called when the owning node is removed.
    pub fn clear(&self) {
        self.inner.actions.lock().unwrap().clear();
        let paths: Vec<PathBinding> = {
            let mut paths = self.inner.paths.lock().unwrap();
            paths.drain(..).collect()
        };
        for binding in &paths {
            binding.dispose();
        }
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.inner.actions.lock().unwrap().len();
        f.debug_struct("BindingRegistry")
            .field("keys", &keys)
            .field("paths", &self.path_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{ChangeSource, PropertyValue};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        (count, move || {
            sink.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn register_invokes_once_immediately() {
        let registry = BindingRegistry::new();
        let (hits, action) = counter();
        registry.register("Text", action);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_fans_out_to_every_action_under_key() {
        let registry = BindingRegistry::new();
        let (a, action_a) = counter();
        let (b, action_b) = counter();
        registry.register("Text", action_a);
        registry.register("Text", action_b);

        registry.notify("Text");
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn notify_matches_exact_key_only() {
        let registry = BindingRegistry::new();
        let (hits, action) = counter();
        registry.register("Text", action);

        registry.notify("Other");
        registry.notify("text");
        assert_eq!(hits.load(Ordering::SeqCst), 1, "only the immediate invoke");
    }

    #[test]
    fn notify_unknown_key_is_a_noop() {
        let registry = BindingRegistry::new();
        registry.notify("Nothing");
    }

    struct Node {
        properties: Mutex<HashMap<String, PropertyValue>>,
        changes: ChangeSource,
    }

    impl Node {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                properties: Mutex::new(HashMap::default()),
                changes: ChangeSource::new(),
            })
        }

        fn set(&self, name: &str, value: PropertyValue) {
            self.properties
                .lock()
                .unwrap()
                .insert(name.to_string(), value);
            self.changes.notify(name);
        }
    }

    impl Observable for Node {
        fn read(&self, property: &str) -> PropertyValue {
            self.properties
                .lock()
                .unwrap()
                .get(property)
                .cloned()
                .unwrap_or(PropertyValue::Null)
        }

        fn changes(&self) -> Option<&ChangeSource> {
            Some(&self.changes)
        }
    }

    #[test]
    fn path_registration_fires_on_deep_change() {
        let user = Node::new();
        user.set("Name", PropertyValue::data(String::from("A")));
        let root = Node::new();
        root.set("User", PropertyValue::object(user.clone()));

        let registry = BindingRegistry::new();
        let (hits, action) = counter();
        registry.register_path(
            PropertyPath::new(["User", "Name"]),
            Some(root.clone()),
            action,
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1, "immediate invoke");

        user.set("Name", PropertyValue::data(String::from("B")));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn path_registration_reachable_via_root_name_sweep() {
        let user = Node::new();
        let root = Node::new();
        root.set("User", PropertyValue::object(user.clone()));

        let registry = BindingRegistry::new();
        let (hits, action) = counter();
        registry.register_path(
            PropertyPath::new(["User", "Name"]),
            Some(root.clone()),
            action,
        );
        assert_eq!(registry.action_count("User"), 1);

        // A parent container doing a bulk notify on the root segment name
        // reaches the nested binding.
        let before = hits.load(Ordering::SeqCst);
        registry.notify("User");
        assert_eq!(hits.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn empty_path_is_constant_binding() {
        let registry = BindingRegistry::new();
        let (hits, action) = counter();
        registry.register_path(PropertyPath::empty(), None, action);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.path_count(), 0);
    }

    #[test]
    fn clear_disposes_path_subscriptions() {
        let user = Node::new();
        let root = Node::new();
        root.set("User", PropertyValue::object(user.clone()));

        let registry = BindingRegistry::new();
        let (hits, action) = counter();
        registry.register_path(
            PropertyPath::new(["User", "Name"]),
            Some(root.clone()),
            action,
        );
        registry.clear();
        assert_eq!(registry.path_count(), 0);

        let before = hits.load(Ordering::SeqCst);
        user.set("Name", PropertyValue::data(1i32));
        registry.notify("User");
        assert_eq!(hits.load(Ordering::SeqCst), before, "no action after clear");
    }
}
