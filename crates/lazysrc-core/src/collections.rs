#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::hash_map::Entry;
    pub use std::collections::{HashMap, HashSet};

    pub type BuildHasher = std::collections::hash_map::RandomState;
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
    pub use std::collections::hash_map::Entry;

    pub type BuildHasher = rustc_hash::FxBuildHasher;
}

/// Insertion-ordered map; iteration follows registration order.
pub type OrderedMap<K, V> = indexmap::IndexMap<K, V, map::BuildHasher>;
