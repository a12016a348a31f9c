use std::fmt;
use std::sync::Arc;

use crate::collections::map::HashSet;

/// An ordered, immutable sequence of property names describing a route
/// through a nested object graph.
///
/// A one-element path reads a property directly off the supplied root
/// context; deeper paths traverse intermediate objects segment by segment.
/// Paths are cheap to clone and never mutated after construction.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Arc<[String]>,
}

impl PropertyPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// A path with no segments. Compiling an expression that references no
    /// members yields this; it represents a constant binding.
    pub fn empty() -> Self {
        Self {
            segments: Arc::from([]),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// The root segment name, used by registries as a fan-out key.
    pub fn first(&self) -> Option<&str> {
        self.segment(0)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Whether `index` addresses the final segment (the bound value itself,
    /// as opposed to an interior object that must be traversed further).
    pub fn is_leaf(&self, index: usize) -> bool {
        index + 1 == self.segments.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in self.iter() {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyPath({self})")
    }
}

/// An unordered set of property names referenced anywhere in a complex
/// binding expression.
///
/// This is the conservative over-approximation produced when an expression
/// body is not a single linear member chain: a binding keyed on it may be
/// invalidated by unrelated same-named properties, but never silently misses
/// a real dependency.
#[derive(Clone, Default)]
pub struct PathSet {
    names: HashSet<String>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl fmt::Debug for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.iter().collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}
