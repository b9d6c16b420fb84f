//! Error types for the persistent collections.
//!
//! Every failure a collection can report is an invalid argument supplied by
//! the caller. Failures are detected before any node is allocated, so a
//! failed call never leaves a partially built handle behind.
//!
//! Looking up or deleting an absent key is not an error and never produces
//! a [`CollectionError`].

/// Errors reported by [`PersistentVector`](super::PersistentVector),
/// [`VectorView`](super::VectorView) and [`MapConfig`](super::MapConfig).
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::{CollectionError, PersistentVector};
///
/// let vector: PersistentVector<i32> = (0..3).collect();
/// assert_eq!(
///     vector.get(3),
///     Err(CollectionError::IndexOutOfBounds { index: 3, length: 3 })
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CollectionError {
    /// An element index was outside `[0, length)`.
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The rejected index.
        index: usize,
        /// The length of the collection at the time of the call.
        length: usize,
    },

    /// A window was requested whose start lies after its stop.
    #[error("invalid slice index: {start} > {stop}")]
    SliceStartAfterStop {
        /// The requested start.
        start: usize,
        /// The requested stop.
        stop: usize,
    },

    /// A window was requested whose stop lies beyond the collection.
    #[error("slice bounds out of range, start={start}, stop={stop}, len={length}")]
    SliceOutOfRange {
        /// The requested start.
        start: usize,
        /// The requested stop.
        stop: usize,
        /// The length of the collection at the time of the call.
        length: usize,
    },

    /// The load factor bounds of a map configuration are unusable.
    #[error("invalid load factors: lower={lower}, upper={upper} (require 0 < lower < upper)")]
    InvalidLoadFactors {
        /// The requested lower load factor.
        lower: f64,
        /// The requested upper load factor.
        upper: f64,
    },
}

/// Convenience alias for collection results.
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Ensures `index` addresses an element of a collection of `length` elements.
#[inline]
pub(crate) const fn check_index(index: usize, length: usize) -> CollectionResult<()> {
    if index < length {
        Ok(())
    } else {
        Err(CollectionError::IndexOutOfBounds { index, length })
    }
}

/// Ensures `[start, stop)` is a window over a collection of `length` elements.
pub(crate) const fn check_window(start: usize, stop: usize, length: usize) -> CollectionResult<()> {
    if start > stop {
        return Err(CollectionError::SliceStartAfterStop { start, stop });
    }
    if stop > length {
        return Err(CollectionError::SliceOutOfRange {
            start,
            stop,
            length,
        });
    }
    Ok(())
}
