//! Persistent (immutable) hash map stored in a [`PersistentVector`] of buckets.
//!
//! This module provides [`PersistentMap`], an immutable key-value store.
//!
//! # Overview
//!
//! The map is a [`PersistentVector`] whose elements are buckets: collision
//! chains of `(key, value)` pairs sharing one slot. A key lives in the bucket
//! at `hash(key) % bucket_count`, and lookups scan that bucket linearly.
//!
//! - O(log32 B + C) `get` where B is the bucket count and C the chain length
//! - O(log32 B + C) `store` and `delete`, with an occasional O(N) rehash
//! - O(1) `len` and `is_empty`
//!
//! Storing or deleting a key copies one bucket and the vector path leading to
//! it. Every other bucket is shared with the original map.
//!
//! # Resizing
//!
//! The bucket vector is rebuilt from scratch when the average chain length
//! leaves the bounds of the map's [`MapConfig`]: it grows when a store finds
//! the map at the upper load factor and shrinks when a delete takes it below
//! the lower one. Across a growth epoch the amortized cost of a store stays
//! near O(1).
//!
//! # Examples
//!
//! ```rust
//! use cowtrie::persistent::PersistentMap;
//!
//! let map = PersistentMap::new()
//!     .store("one".to_string(), 1)
//!     .store("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.store("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FromIterator;
use std::ops::ControlFlow;

use smallvec::SmallVec;

use super::config::MapConfig;
use super::hash::{DefaultHashProvider, HashProvider};
use super::{PersistentVector, PersistentVectorIterator, ReferenceCounter};

// =============================================================================
// Buckets
// =============================================================================

/// A collision chain. `None` marks a slot no key hashes to.
type Bucket<K, V> = Option<ReferenceCounter<[(K, V)]>>;

/// Maps a hash onto a bucket slot.
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn bucket_index(hash: u64, bucket_count: usize) -> usize {
    (hash % bucket_count.max(1) as u64) as usize
}

/// Mutable bucket array used while building a map from scratch.
///
/// It is owned by the building call and frozen into a [`PersistentVector`]
/// of shared buckets before anything can observe it.
struct BucketTable<K, V> {
    buckets: Vec<SmallVec<[(K, V); 2]>>,
    length: usize,
}

impl<K: Eq, V> BucketTable<K, V> {
    fn with_buckets(bucket_count: usize) -> Self {
        Self {
            buckets: (0..bucket_count.max(1)).map(|_| SmallVec::new()).collect(),
            length: 0,
        }
    }

    /// Inserts an entry, overwriting the value of an equal key in place.
    fn insert<S: HashProvider<K>>(&mut self, hasher: &S, key: K, value: V) {
        let position = bucket_index(hasher.hash_key(&key), self.buckets.len());
        let Some(bucket) = self.buckets.get_mut(position) else {
            return;
        };

        if let Some(entry) = bucket.iter_mut().find(|(existing, _)| *existing == key) {
            entry.1 = value;
        } else {
            bucket.push((key, value));
            self.length += 1;
        }
    }

    fn into_map<S>(self, config: MapConfig, hasher: S) -> PersistentMap<K, V, S> {
        let buckets = self
            .buckets
            .into_iter()
            .map(|bucket| {
                if bucket.is_empty() {
                    None
                } else {
                    Some(bucket.into_iter().collect::<ReferenceCounter<[(K, V)]>>())
                }
            })
            .collect();

        PersistentMap {
            buckets,
            length: self.length,
            config,
            hasher,
        }
    }
}

// =============================================================================
// PersistentMap Definition
// =============================================================================

/// A persistent (immutable) hash map built on a vector of buckets.
///
/// Keys are hashed by the map's [`HashProvider`] `S`, supplied at
/// construction. Any provider that hashes equal keys equally gives correct
/// results; a poor one only makes the collision chains longer.
///
/// # Time Complexity
///
/// | Operation      | Complexity                          |
/// |----------------|-------------------------------------|
/// | `new`          | O(1)                                |
/// | `get`          | O(log32 B) + chain scan             |
/// | `store`        | O(log32 B) + chain copy, rehash O(N) |
/// | `delete`       | O(log32 B) + chain copy, rehash O(N) |
/// | `len`          | O(1)                                |
/// | `iter`         | O(N)                                |
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::PersistentMap;
///
/// let map: PersistentMap<i32, &str> = [(1, "one"), (2, "two")].into_iter().collect();
/// let removed = map.delete(&1);
///
/// assert_eq!(map.len(), 2);
/// assert_eq!(removed.len(), 1);
/// assert_eq!(removed.load(&1), ("", false));
/// ```
pub struct PersistentMap<K, V, S = DefaultHashProvider> {
    /// Bucket vector; never empty
    buckets: PersistentVector<Bucket<K, V>>,
    /// Number of distinct keys across all buckets
    length: usize,
    config: MapConfig,
    hasher: S,
}

impl<K, V, S: Clone> Clone for PersistentMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            length: self.length,
            config: self.config,
            hasher: self.hasher.clone(),
        }
    }
}

impl<K, V> PersistentMap<K, V, DefaultHashProvider> {
    /// Creates a new empty map using the default hash provider and load factors.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentMap;
    ///
    /// let map: PersistentMap<String, i32> = PersistentMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config_and_hasher(MapConfig::default(), DefaultHashProvider::default())
    }

    /// Creates a new empty map with the given load factors.
    #[inline]
    #[must_use]
    pub fn with_config(config: MapConfig) -> Self {
        Self::with_config_and_hasher(config, DefaultHashProvider::default())
    }
}

impl<K, V, S> PersistentMap<K, V, S> {
    /// Creates a new empty map hashing keys with `hasher`.
    #[inline]
    #[must_use]
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config_and_hasher(MapConfig::default(), hasher)
    }

    /// Creates a new empty map with the given load factors and hash provider.
    #[must_use]
    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Self {
        let bucket_count = config.bucket_count_for(0);
        Self {
            buckets: std::iter::repeat_n(None, bucket_count).collect(),
            length: 0,
            config,
            hasher,
        }
    }

    /// Returns the number of entries in the map.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the current length of the bucket vector.
    #[inline]
    #[must_use]
    pub const fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the load factor bounds of this map.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Returns the hash provider of this map.
    #[inline]
    #[must_use]
    pub const fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Returns an iterator over the entries, bucket by bucket.
    ///
    /// The order is unspecified and may change after any store or delete.
    #[must_use]
    pub fn iter(&self) -> PersistentMapIterator<'_, K, V> {
        PersistentMapIterator {
            buckets: self.buckets.iter(),
            current: [].iter(),
            remaining: self.length,
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Visits every entry until `visit` breaks.
    ///
    /// Once `visit` returns [`ControlFlow::Break`], no further entry is
    /// visited and the break value is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentMap;
    /// use std::ops::ControlFlow;
    ///
    /// let map: PersistentMap<i32, i32> = (0..100).map(|key| (key, key * 2)).collect();
    /// let mut visited = 0;
    /// let flow = map.range(|_, _| {
    ///     visited += 1;
    ///     if visited == 3 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    /// });
    ///
    /// assert!(flow.is_break());
    /// assert_eq!(visited, 3);
    /// ```
    pub fn range<B, F>(&self, mut visit: F) -> ControlFlow<B>
    where
        F: FnMut(&K, &V) -> ControlFlow<B>,
    {
        self.iter().try_for_each(|(key, value)| visit(key, value))
    }

    /// Returns the chain stored at `position`.
    fn bucket(&self, position: usize) -> &[(K, V)] {
        self.buckets
            .get(position)
            .ok()
            .and_then(Option::as_deref)
            .unwrap_or(&[])
    }

    /// Returns the bucket slot `key` hashes to.
    fn position<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized,
        S: HashProvider<Q>,
    {
        bucket_index(
            <S as HashProvider<Q>>::hash_key(&self.hasher, key),
            self.buckets.len(),
        )
    }

    /// Returns a reference to the value stored for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().store("key".to_string(), 42);
    /// assert_eq!(map.get("key"), Some(&42));
    /// assert_eq!(map.get("missing"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        S: HashProvider<Q>,
    {
        self.bucket(self.position(key))
            .iter()
            .find(|(existing, _)| existing.borrow() == key)
            .map(|(_, value)| value)
    }

    /// Returns the value stored for `key` and whether it was found.
    ///
    /// An absent key yields `V::default()` and `false`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().store("a", 1);
    /// assert_eq!(map.load(&"a"), (1, true));
    /// assert_eq!(map.load(&"b"), (0, false));
    /// ```
    pub fn load<Q>(&self, key: &Q) -> (V, bool)
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        S: HashProvider<Q>,
        V: Default + Clone,
    {
        self.get(key)
            .map_or_else(|| (V::default(), false), |value| (value.clone(), true))
    }

    /// Returns `true` if the map holds an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        S: HashProvider<Q>,
    {
        self.get(key).is_some()
    }
}

impl<K, V, S> PersistentMap<K, V, S>
where
    K: Eq + Clone,
    V: Clone,
    S: HashProvider<K> + Clone,
{
    /// Builds a map from `entries` with the given load factors and hash provider.
    ///
    /// When a key occurs more than once, the last value wins.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::{HashFn, MapConfig, PersistentMap};
    ///
    /// let map = PersistentMap::from_entries_with(
    ///     [(1_u64, "a"), (2, "b"), (1, "c")],
    ///     MapConfig::default(),
    ///     HashFn(|key: &u64| *key),
    /// );
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.get(&1), Some(&"c"));
    /// ```
    pub fn from_entries_with<I>(entries: I, config: MapConfig, hasher: S) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        let mut table = BucketTable::with_buckets(config.bucket_count_for(entries.len()));
        for (key, value) in entries {
            table.insert(&hasher, key, value);
        }
        table.into_map(config, hasher)
    }

    /// Returns a new map with `key` bound to `value`.
    ///
    /// An existing entry for `key` is replaced in place and the length is
    /// unchanged. If the map is at its upper load factor, the bucket vector
    /// is rebuilt for one more entry first.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().store("a", 1);
    /// let replaced = map.store("a", 11);
    /// let added = map.store("b", 2);
    ///
    /// assert_eq!(replaced.len(), 1);
    /// assert_eq!(replaced.get(&"a"), Some(&11));
    /// assert_eq!(added.len(), 2);
    /// assert_eq!(map.get(&"a"), Some(&1));
    /// ```
    #[must_use]
    pub fn store(&self, key: K, value: V) -> Self {
        if self.config.should_grow(self.length, self.buckets.len()) {
            return self.rehash(self.length + 1, Some((key, value)));
        }

        let position = self.position(&key);
        let bucket = self.bucket(position);

        let (entries, length) =
            match bucket.iter().position(|(existing, _)| *existing == key) {
                Some(offset) => {
                    let mut entries = bucket.to_vec();
                    entries[offset] = (key, value);
                    (entries, self.length)
                }
                None => {
                    let mut entries = Vec::with_capacity(bucket.len() + 1);
                    entries.extend_from_slice(bucket);
                    entries.push((key, value));
                    (entries, self.length + 1)
                }
            };

        Self {
            buckets: self
                .buckets
                .replace(position, Some(ReferenceCounter::from(entries))),
            length,
            config: self.config,
            hasher: self.hasher.clone(),
        }
    }

    /// Returns a new map without the entry for `key`.
    ///
    /// Deleting an absent key returns a map sharing all storage with this
    /// one. If the map drops below its lower load factor, the bucket vector
    /// is rebuilt smaller.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().store("a", 1).store("b", 2);
    /// let removed = map.delete(&"a");
    ///
    /// assert_eq!(removed.len(), 1);
    /// assert_eq!(removed.get(&"a"), None);
    /// assert_eq!(map.delete(&"missing"), map);
    /// ```
    #[must_use]
    pub fn delete<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        S: HashProvider<Q>,
    {
        let position = self.position(key);
        let bucket = self.bucket(position);

        if !bucket.iter().any(|(existing, _)| existing.borrow() == key) {
            return self.clone();
        }

        let remaining: Vec<(K, V)> = bucket
            .iter()
            .filter(|(existing, _)| existing.borrow() != key)
            .cloned()
            .collect();
        let removed = bucket.len() - remaining.len();
        let new_bucket = if remaining.is_empty() {
            None
        } else {
            Some(ReferenceCounter::from(remaining))
        };

        let map = Self {
            buckets: self.buckets.replace(position, new_bucket),
            length: self.length - removed,
            config: self.config,
            hasher: self.hasher.clone(),
        };

        if map.config.should_shrink(map.length, map.buckets.len()) {
            map.rehash(map.length, None)
        } else {
            map
        }
    }

    /// Rebuilds the bucket vector sized for `entry_count` entries, adding
    /// `extra` on top of the existing entries.
    fn rehash(&self, entry_count: usize, extra: Option<(K, V)>) -> Self {
        let mut table = BucketTable::with_buckets(self.config.bucket_count_for(entry_count));
        for (key, value) in self {
            table.insert(&self.hasher, key.clone(), value.clone());
        }
        if let Some((key, value)) = extra {
            table.insert(&self.hasher, key, value);
        }

        let map = table.into_map(self.config, self.hasher.clone());
        tracing::debug!(
            from_buckets = self.buckets.len(),
            to_buckets = map.buckets.len(),
            entries = map.length,
            "rehashed persistent map"
        );
        map
    }
}

impl<K, V, S> PersistentMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Copies every entry into a standard `HashMap`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentMap;
    /// use std::collections::HashMap;
    ///
    /// let native = HashMap::from([("a", 1), ("b", 2)]);
    /// let map = PersistentMap::from(native.clone());
    /// assert_eq!(map.to_hash_map(), native);
    /// ```
    #[must_use]
    pub fn to_hash_map(&self) -> HashMap<K, V> {
        self.iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the entries of a [`PersistentMap`].
pub struct PersistentMapIterator<'a, K, V> {
    buckets: PersistentVectorIterator<'a, Bucket<K, V>>,
    current: std::slice::Iter<'a, (K, V)>,
    remaining: usize,
}

impl<'a, K, V> Iterator for PersistentMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, value)) = self.current.next() {
                self.remaining = self.remaining.saturating_sub(1);
                return Some((key, value));
            }
            if let Some(entries) = self.buckets.next()? {
                self.current = entries.iter();
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentMapIterator<'_, K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, S: Default> Default for PersistentMap<K, V, S> {
    fn default() -> Self {
        Self::with_config_and_hasher(MapConfig::default(), S::default())
    }
}

impl<K, V, S> FromIterator<(K, V)> for PersistentMap<K, V, S>
where
    K: Eq + Clone,
    V: Clone,
    S: HashProvider<K> + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries_with(iter, MapConfig::default(), S::default())
    }
}

impl<K, V, H> From<HashMap<K, V, H>> for PersistentMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
    H: BuildHasher,
{
    fn from(native: HashMap<K, V, H>) -> Self {
        native.into_iter().collect()
    }
}

impl<'a, K, V, S> IntoIterator for &'a PersistentMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentMapIterator<'a, K, V>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Maps are equal when they hold the same set of entries, regardless of
/// bucket layout or iteration order.
impl<K, V, S> PartialEq for PersistentMap<K, V, S>
where
    K: Eq,
    V: PartialEq,
    S: HashProvider<K>,
{
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        if self.buckets.shares_storage_with(&other.buckets) {
            return true;
        }
        self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, S> Eq for PersistentMap<K, V, S>
where
    K: Eq,
    V: Eq,
    S: HashProvider<K>,
{
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for PersistentMap<K, V, S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V, S> serde::Serialize for PersistentMap<K, V, S>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: serde::Serializer,
    {
        serializer.collect_map(self.iter())
    }
}

#[cfg(feature = "serde")]
struct PersistentMapVisitor<K, V, S> {
    marker: std::marker::PhantomData<(K, V, S)>,
}

#[cfg(feature = "serde")]
impl<'de, K, V, S> serde::de::Visitor<'de> for PersistentMapVisitor<K, V, S>
where
    K: serde::Deserialize<'de> + Eq + Clone,
    V: serde::Deserialize<'de> + Clone,
    S: HashProvider<K> + Clone + Default,
{
    type Value = PersistentMap<K, V, S>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        const MAX_PREALLOCATE: usize = 4096;
        let capacity = access.size_hint().unwrap_or(0).min(MAX_PREALLOCATE);
        let mut entries = Vec::with_capacity(capacity);
        while let Some(entry) = access.next_entry()? {
            entries.push(entry);
        }
        Ok(entries.into_iter().collect())
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, S> serde::Deserialize<'de> for PersistentMap<K, V, S>
where
    K: serde::Deserialize<'de> + Eq + Clone,
    V: serde::Deserialize<'de> + Clone,
    S: HashProvider<K> + Clone + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentMapVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
