//! Persistent (immutable) collections with copy-on-write structural sharing.
//!
//! This module provides:
//!
//! - [`PersistentVector`]: index-addressable sequence (32-way bit-partitioned trie)
//! - [`VectorView`]: `[start, stop)` window over a shared vector
//! - [`PersistentMap`]: hash map stored as a vector of collision buckets
//!
//! # Structural Sharing
//!
//! Every mutator returns a new handle and leaves the original valid and
//! unchanged. Only the nodes on the touched path are copied; all other
//! subtrees are shared by reference between versions.
//!
//! # Examples
//!
//! ## `PersistentVector`
//!
//! ```rust
//! use cowtrie::persistent::PersistentVector;
//!
//! let vector = PersistentVector::new().append([1, 2, 3]).append([4]);
//! assert_eq!(vector.len(), 4);
//! for index in 0..4 {
//!     assert_eq!(vector.get(index), Ok(&(index as i32 + 1)));
//! }
//! ```
//!
//! ## `VectorView`
//!
//! ```rust
//! use cowtrie::persistent::PersistentVector;
//!
//! let vector: PersistentVector<i32> = (0..10).collect();
//! let view = vector.slice(3, 6).unwrap();
//! assert_eq!(view.to_vec(), vec![3, 4, 5]);
//! ```
//!
//! ## `PersistentMap`
//!
//! ```rust
//! use cowtrie::persistent::PersistentMap;
//!
//! let map = ["a", "b", "c", "d", "e", "f", "g", "h"]
//!     .into_iter()
//!     .zip(1..)
//!     .fold(PersistentMap::new(), |map, (key, value)| map.store(key, value));
//! let updated = map.store("a", 11);
//!
//! assert_eq!(map.load(&"a"), (1, true));
//! assert_eq!(updated.load(&"a"), (11, true));
//! assert_eq!(map.len(), 8);
//! assert_eq!(updated.len(), 8);
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled (default), this is `std::sync::Arc`,
/// so collections are `Send + Sync` and can be shared across threads.
///
/// When the `arc` feature is disabled, this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod config;
mod error;
mod hash;
mod map;
mod vector;
mod view;

pub use config::{DEFAULT_LOWER_LOAD_FACTOR, DEFAULT_UPPER_LOAD_FACTOR, MapConfig};
pub use error::{CollectionError, CollectionResult};
pub use hash::{DefaultHashProvider, HashFn, HashProvider};
pub use map::{PersistentMap, PersistentMapIterator};
pub use vector::{PersistentVector, PersistentVectorIntoIterator, PersistentVectorIterator};
pub use view::VectorView;

#[cfg(feature = "arc")]
mod thread_safety {
    use super::{PersistentMap, PersistentVector, VectorView};
    use static_assertions::assert_impl_all;

    assert_impl_all!(PersistentVector<i32>: Send, Sync);
    assert_impl_all!(PersistentVector<String>: Send, Sync);
    assert_impl_all!(VectorView<String>: Send, Sync);
    assert_impl_all!(PersistentMap<String, i32>: Send, Sync);
}

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentVector<i32>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================
