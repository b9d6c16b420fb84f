//! # cowtrie
//!
//! Persistent (immutable) collections for Rust with copy-on-write
//! structural sharing.
//!
//! ## Overview
//!
//! Every update returns a new collection and leaves the original valid and
//! unchanged. Versions share all storage that the update did not touch, so
//! keeping many versions around is cheap.
//!
//! - **`PersistentVector`**: 32-way bit-partitioned trie with a tail buffer
//! - **`VectorView`**: `[start, stop)` window over a shared vector
//! - **`PersistentMap`**: hash map backed by a persistent vector of buckets
//!
//! ## Feature Flags
//!
//! - `arc`: Use `Arc` for sharing so collections are `Send + Sync` (default)
//! - `serde`: `Serialize`/`Deserialize` for all collections
//! - `fxhash`: Use `rustc-hash` as the default map hasher
//! - `ahash`: Use `ahash` as the default map hasher
//! - `full`: Enable `arc` and `serde`
//!
//! ## Example
//!
//! ```rust
//! use cowtrie::prelude::*;
//!
//! let vector = PersistentVector::new().append([1, 2, 3]);
//! let updated = vector.set(0, 10).unwrap();
//! assert_eq!(vector.get(0), Ok(&1));
//! assert_eq!(updated.get(0), Ok(&10));
//!
//! let map = PersistentMap::new().store("key", 1);
//! assert_eq!(map.get(&"key"), Some(&1));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use cowtrie::prelude::*;
/// ```
pub mod prelude {
    pub use crate::persistent::*;
}

pub mod persistent;
