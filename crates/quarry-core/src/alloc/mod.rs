//! Hash collections used throughout Quarry.
//!
//! Paths and GUIDs are hashed on every index lookup, so the crate standardises
//! on AHash instead of SipHash.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

/// Build an empty map with room for `capacity` entries.
pub fn map_with_capacity<K, V>(capacity: usize) -> HashMap<K, V> {
    HashMap::with_capacity(capacity)
}

/// Build an empty set with room for `capacity` entries.
pub fn set_with_capacity<T>(capacity: usize) -> HashSet<T> {
    HashSet::with_capacity(capacity)
}
