//! Hash map/set selection for the binding engine.
//!
//! The default build routes through `hashbrown` with an `ahash` hasher; the
//! `std-hash` feature swaps in the standard library maps for environments
//! that want to avoid the extra dependencies.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
    pub type HashSet<T> = hashbrown::HashSet<T, ahash::RandomState>;
}
