//! Property-based tests for PersistentMap laws.
//!
//! This module verifies the size laws, absence, grow/shrink transparency and
//! the round-trip through `HashMap` using proptest.

use cowtrie::persistent::{HashFn, MapConfig, PersistentMap};
use proptest::prelude::*;
use std::collections::HashMap;

fn build(entries: &[(u16, i32)]) -> PersistentMap<u16, i32> {
    entries
        .iter()
        .fold(PersistentMap::new(), |map, (key, value)| map.store(*key, *value))
}

/// Distinct keys in insertion order paired with an independent shuffle of them.
fn keys_with_deletion_order() -> impl Strategy<Value = (Vec<u32>, Vec<u32>)> {
    prop::collection::hash_set(any::<u32>(), 0..500).prop_flat_map(|keys| {
        let inserted: Vec<u32> = keys.into_iter().collect();
        (Just(inserted.clone()), Just(inserted).prop_shuffle())
    })
}

// =============================================================================
// Model Equivalence
// =============================================================================

proptest! {
    /// A sequence of stores and deletes agrees with std HashMap at every step
    #[test]
    fn prop_matches_hash_map_model(
        operations in prop::collection::vec((any::<bool>(), 0_u16..200, any::<i32>()), 0..600)
    ) {
        let mut model = HashMap::new();
        let mut map = PersistentMap::new();

        for (is_store, key, value) in operations {
            if is_store {
                model.insert(key, value);
                map = map.store(key, value);
            } else {
                model.remove(&key);
                map = map.delete(&key);
            }
            prop_assert_eq!(map.len(), model.len());
        }

        prop_assert_eq!(map.to_hash_map(), model);
    }
}

// =============================================================================
// Size Laws
// =============================================================================

proptest! {
    /// store grows the length by one only for a new key
    #[test]
    fn prop_store_size_law(
        entries in prop::collection::vec((any::<u16>(), any::<i32>()), 0..300),
        key in any::<u16>(),
        value in any::<i32>()
    ) {
        let map = build(&entries);
        let was_present = map.contains_key(&key);
        let stored = map.store(key, value);

        prop_assert_eq!(stored.len(), map.len() + usize::from(!was_present));
        prop_assert_eq!(stored.get(&key), Some(&value));
    }

    /// delete shrinks the length by one only for a present key
    #[test]
    fn prop_delete_size_law(
        entries in prop::collection::vec((any::<u16>(), any::<i32>()), 0..300),
        key in any::<u16>()
    ) {
        let map = build(&entries);
        let was_present = map.contains_key(&key);
        let deleted = map.delete(&key);

        prop_assert_eq!(deleted.len(), map.len() - usize::from(was_present));
        prop_assert!(!deleted.contains_key(&key));
        if !was_present {
            prop_assert_eq!(deleted, map);
        }
    }

    /// A key that was never stored loads as the default value
    #[test]
    fn prop_absent_key_loads_default(
        entries in prop::collection::vec((0_u16..1000, any::<i32>()), 0..300),
        absent in 1000_u16..
    ) {
        let map = build(&entries);
        prop_assert_eq!(map.load(&absent), (0, false));
    }
}

// =============================================================================
// Grow / Shrink Transparency
// =============================================================================

proptest! {
    /// Inserting N keys and deleting them in any order yields an empty map
    #[test]
    fn prop_insert_then_delete_all_is_empty(
        (inserted, deletion_order) in keys_with_deletion_order()
    ) {
        let full = inserted
            .iter()
            .fold(PersistentMap::new(), |map, key| map.store(*key, *key));
        prop_assert_eq!(full.len(), inserted.len());

        let emptied = deletion_order
            .iter()
            .fold(full, |map, key| map.delete(key));

        prop_assert!(emptied.is_empty());
        prop_assert_eq!(emptied, PersistentMap::new());
    }

    /// Contents do not depend on the load factors or the bucket layout
    #[test]
    fn prop_layout_does_not_affect_contents(
        entries in prop::collection::vec((any::<u16>(), any::<i32>()), 0..400)
    ) {
        let default_layout = build(&entries);
        let tight = PersistentMap::from_entries_with(
            entries.iter().copied(),
            MapConfig::new(0.5, 1.0).unwrap(),
            HashFn(|key: &u16| u64::from(*key)),
        );

        prop_assert_eq!(default_layout.len(), tight.len());
        for (key, value) in &default_layout {
            prop_assert_eq!(tight.get(key), Some(value));
        }
    }
}

// =============================================================================
// Round-trip
// =============================================================================

proptest! {
    /// HashMap -> PersistentMap -> HashMap is set-equal to the input
    #[test]
    fn prop_hash_map_round_trip(
        native in prop::collection::hash_map(any::<String>(), any::<i64>(), 0..300)
    ) {
        let map = PersistentMap::from(native.clone());
        prop_assert_eq!(map.len(), native.len());
        prop_assert_eq!(map.to_hash_map(), native);
    }
}
