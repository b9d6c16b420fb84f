//! Load factor configuration for [`PersistentMap`](super::PersistentMap).

use super::error::{CollectionError, CollectionResult};

/// Default upper load factor: the map grows once it holds this many entries
/// per bucket on average.
pub const DEFAULT_UPPER_LOAD_FACTOR: f64 = 8.0;

/// Default lower load factor: the map shrinks once it holds fewer entries
/// than this per bucket on average.
pub const DEFAULT_LOWER_LOAD_FACTOR: f64 = 2.0;

/// Bounds on the ratio of entries to buckets in a [`PersistentMap`](super::PersistentMap).
///
/// Crossing either bound triggers a full rehash into a bucket vector sized
/// for the midpoint of the two. The bounds only affect performance; lookups
/// are correct for any valid configuration.
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::MapConfig;
///
/// let config = MapConfig::new(1.0, 4.0).unwrap();
/// assert_eq!(config.mid_load_factor(), 2.5);
///
/// assert!(MapConfig::new(4.0, 1.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapConfig {
    lower_load_factor: f64,
    upper_load_factor: f64,
}

impl MapConfig {
    /// Creates a configuration with the given load factor bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidLoadFactors`] unless both bounds are
    /// finite and `0 < lower < upper`.
    pub fn new(lower_load_factor: f64, upper_load_factor: f64) -> CollectionResult<Self> {
        let valid = lower_load_factor.is_finite()
            && upper_load_factor.is_finite()
            && lower_load_factor > 0.0
            && lower_load_factor < upper_load_factor;

        if valid {
            Ok(Self {
                lower_load_factor,
                upper_load_factor,
            })
        } else {
            Err(CollectionError::InvalidLoadFactors {
                lower: lower_load_factor,
                upper: upper_load_factor,
            })
        }
    }

    /// Returns the lower load factor bound.
    #[inline]
    #[must_use]
    pub const fn lower_load_factor(&self) -> f64 {
        self.lower_load_factor
    }

    /// Returns the upper load factor bound.
    #[inline]
    #[must_use]
    pub const fn upper_load_factor(&self) -> f64 {
        self.upper_load_factor
    }

    /// Returns the load factor a freshly rehashed map is sized for.
    #[inline]
    #[must_use]
    pub fn mid_load_factor(&self) -> f64 {
        (self.upper_load_factor + self.lower_load_factor) / 2.0
    }

    /// Number of buckets to allocate for `entry_count` entries.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub(crate) fn bucket_count_for(&self, entry_count: usize) -> usize {
        (entry_count as f64 / self.mid_load_factor()) as usize + 1
    }

    /// Whether storing one more entry requires growing the bucket vector.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn should_grow(&self, entry_count: usize, bucket_count: usize) -> bool {
        entry_count as f64 >= bucket_count as f64 * self.upper_load_factor
    }

    /// Whether a map this sparse should shrink its bucket vector.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn should_shrink(&self, entry_count: usize, bucket_count: usize) -> bool {
        bucket_count > 1 && (entry_count as f64) < bucket_count as f64 * self.lower_load_factor
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            lower_load_factor: DEFAULT_LOWER_LOAD_FACTOR,
            upper_load_factor: DEFAULT_UPPER_LOAD_FACTOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_default_bounds() {
        let config = MapConfig::default();
        assert_eq!(config.lower_load_factor(), 2.0);
        assert_eq!(config.upper_load_factor(), 8.0);
        assert_eq!(config.mid_load_factor(), 5.0);
    }

    #[rstest]
    #[case(0.0, 8.0)]
    #[case(-1.0, 8.0)]
    #[case(8.0, 8.0)]
    #[case(9.0, 8.0)]
    #[case(f64::NAN, 8.0)]
    #[case(2.0, f64::INFINITY)]
    fn test_rejects_invalid_bounds(#[case] lower: f64, #[case] upper: f64) {
        assert!(matches!(
            MapConfig::new(lower, upper),
            Err(CollectionError::InvalidLoadFactors { .. })
        ));
    }

    #[rstest]
    #[case(0, 1)]
    #[case(4, 1)]
    #[case(5, 2)]
    #[case(100, 21)]
    fn test_bucket_count_for(#[case] entries: usize, #[case] expected: usize) {
        assert_eq!(MapConfig::default().bucket_count_for(entries), expected);
    }

    #[rstest]
    fn test_grow_and_shrink_thresholds() {
        let config = MapConfig::default();
        assert!(!config.should_grow(7, 1));
        assert!(config.should_grow(8, 1));
        assert!(config.should_shrink(3, 2));
        assert!(!config.should_shrink(4, 2));
        assert!(!config.should_shrink(0, 1));
    }
}
