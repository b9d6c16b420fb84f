//! Key hashing for [`PersistentMap`](super::PersistentMap).
//!
//! A map never hashes keys itself. It asks a [`HashProvider`] supplied at
//! construction for an unsigned integer per key. The only requirement for
//! correctness is determinism on equality: equal keys must hash equally.
//! Distribution quality only affects how long the collision chains get.
//!
//! Every [`BuildHasher`] is a provider for keys implementing [`Hash`], so the
//! standard hashers, `rustc-hash` and `ahash` all plug in directly. Arbitrary
//! functions are adapted with [`HashFn`].
//!
//! # Examples
//!
//! ```rust
//! use cowtrie::persistent::{HashFn, HashProvider, PersistentMap};
//!
//! let length_hash = HashFn(|key: &String| key.len() as u64);
//! assert_eq!(length_hash.hash_key(&"abc".to_string()), 3);
//!
//! let map = PersistentMap::with_hasher(length_hash)
//!     .store("one".to_string(), 1)
//!     .store("two".to_string(), 2);
//! assert_eq!(map.get(&"two".to_string()), Some(&2));
//! ```

use std::fmt;
use std::hash::{BuildHasher, Hash};

/// Produces a deterministic unsigned hash for keys of type `K`.
///
/// Implementations must return equal values for equal keys. A constant
/// function is a valid (if slow) provider: every key lands in one bucket and
/// lookups fall back to a linear scan.
pub trait HashProvider<K: ?Sized> {
    /// Returns the hash of `key`.
    fn hash_key(&self, key: &K) -> u64;
}

impl<K, S> HashProvider<K> for S
where
    K: Hash + ?Sized,
    S: BuildHasher,
{
    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        self.hash_one(key)
    }
}

/// Adapts a plain function `Fn(&K) -> u64` into a [`HashProvider`].
#[derive(Clone, Copy, Default)]
pub struct HashFn<F>(pub F);

impl<K, F> HashProvider<K> for HashFn<F>
where
    K: ?Sized,
    F: Fn(&K) -> u64,
{
    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        (self.0)(key)
    }
}

impl<F> fmt::Debug for HashFn<F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("HashFn")
    }
}

/// The provider used when a map is built without an explicit hasher.
///
/// Deterministic `SipHash` with fixed keys unless one of the `fxhash` or
/// `ahash` features selects a faster hasher.
#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
pub type DefaultHashProvider =
    std::hash::BuildHasherDefault<std::collections::hash_map::DefaultHasher>;

/// The provider used when a map is built without an explicit hasher.
#[cfg(feature = "fxhash")]
pub type DefaultHashProvider = rustc_hash::FxBuildHasher;

/// The provider used when a map is built without an explicit hasher.
#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
pub type DefaultHashProvider = ahash::RandomState;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::BuildHasherDefault;

    type SipHashProvider = BuildHasherDefault<DefaultHasher>;

    #[rstest]
    fn test_build_hasher_is_deterministic_on_equal_keys() {
        let provider = DefaultHashProvider::default();
        let first = provider.hash_key("key");
        let second = provider.hash_key(&"key".to_string());
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_sip_provider_instances_agree() {
        let left = SipHashProvider::default();
        let right = SipHashProvider::default();
        assert_eq!(left.hash_key(&42_u32), right.hash_key(&42_u32));
    }

    #[rstest]
    #[case(0)]
    #[case(7)]
    #[case(u64::MAX)]
    fn test_hash_fn_forwards_to_function(#[case] value: u64) {
        let identity = HashFn(|key: &u64| *key);
        assert_eq!(identity.hash_key(&value), value);
    }

    #[rstest]
    fn test_hash_fn_debug() {
        let constant = HashFn(|_: &i32| 0);
        assert_eq!(format!("{constant:?}"), "HashFn");
    }
}
