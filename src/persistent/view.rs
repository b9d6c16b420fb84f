//! Lightweight windows over a [`PersistentVector`].
//!
//! A [`VectorView`] is a `[start, stop)` window onto a shared vector. It
//! follows the same copy-on-write contract: every operation returns a new
//! view and leaves the original (and the backing vector) untouched.

use std::fmt;
use std::iter::FromIterator;
use std::ops::ControlFlow;

use super::error::{CollectionResult, check_index, check_window};
use super::vector::write_display_list;
use super::{PersistentVector, PersistentVectorIterator};

/// A window `[start, stop)` over a [`PersistentVector`].
///
/// Creating, re-windowing and cloning a view never copies elements.
/// Appending to a view whose window ends before the backing vector does
/// overwrites the slots past the window instead of growing the vector, which
/// keeps the number of newly allocated nodes small.
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (0..10).collect();
/// let view = vector.slice(2, 5).unwrap();
/// let appended = view.append([100, 101]);
///
/// assert_eq!(appended.to_vec(), vec![2, 3, 4, 100, 101]);
/// assert_eq!(view.to_vec(), vec![2, 3, 4]);        // Original view unchanged
/// assert_eq!(vector.get(5), Ok(&5));               // Backing vector unchanged
/// ```
pub struct VectorView<T> {
    vector: PersistentVector<T>,
    start: usize,
    stop: usize,
}

impl<T> Clone for VectorView<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            vector: self.vector.clone(),
            start: self.start,
            stop: self.stop,
        }
    }
}

impl<T> VectorView<T> {
    /// Creates an empty view over an empty vector.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(PersistentVector::new(), 0, 0)
    }

    /// Builds a view from a window already validated against `vector`.
    pub(crate) const fn from_parts(vector: PersistentVector<T>, start: usize, stop: usize) -> Self {
        Self {
            vector,
            start,
            stop,
        }
    }

    /// Returns the number of elements in the window.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.stop - self.start
    }

    /// Returns `true` if the window is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Returns the index in the backing vector where the window starts.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Returns the index in the backing vector where the window stops.
    #[inline]
    #[must_use]
    pub const fn stop(&self) -> usize {
        self.stop
    }

    /// Returns the shared backing vector.
    #[inline]
    #[must_use]
    pub const fn backing(&self) -> &PersistentVector<T> {
        &self.vector
    }

    /// Returns a reference to the element at `index` within the window.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`](super::CollectionError::IndexOutOfBounds)
    /// if `index >= len()`, even when the backing vector has an element there.
    pub fn get(&self, index: usize) -> CollectionResult<&T> {
        check_index(index, self.len())?;
        self.vector.get(self.start + index)
    }

    /// Returns an iterator over the elements of the window.
    #[must_use]
    pub fn iter(&self) -> PersistentVectorIterator<'_, T> {
        PersistentVectorIterator::new(&self.vector, self.start, self.stop)
    }

    /// Visits every element of the window in order until `visit` breaks.
    pub fn range<B, F>(&self, visit: F) -> ControlFlow<B>
    where
        F: FnMut(&T) -> ControlFlow<B>,
    {
        self.iter().try_for_each(visit)
    }

    /// Returns a view of `[start, stop)` relative to this window.
    ///
    /// The backing vector is shared, not touched.
    ///
    /// # Errors
    ///
    /// Fails when `start > stop` or `stop > len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..10).collect();
    /// let view = vector.slice(2, 8).unwrap().slice(1, 3).unwrap();
    /// assert_eq!(view.to_vec(), vec![3, 4]);
    /// assert!(view.slice(0, 3).is_err());
    /// ```
    pub fn slice(&self, start: usize, stop: usize) -> CollectionResult<Self> {
        check_window(start, stop, self.len())?;
        Ok(Self {
            vector: self.vector.clone(),
            start: self.start + start,
            stop: self.start + stop,
        })
    }
}

impl<T: Clone> VectorView<T> {
    /// Returns a new view with the element at `index` replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`](super::CollectionError::IndexOutOfBounds)
    /// if `index >= len()`.
    pub fn set(&self, index: usize, element: T) -> CollectionResult<Self> {
        check_index(index, self.len())?;
        Ok(Self {
            vector: self.vector.replace(self.start + index, element),
            start: self.start,
            stop: self.stop,
        })
    }

    /// Returns a new view with every item appended after the window.
    ///
    /// While the window ends inside the backing vector, items overwrite the
    /// backing slots past `stop`. The remaining items are appended to the
    /// backing vector.
    #[must_use]
    pub fn append<I>(&self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut items = items.into_iter();
        let mut vector = self.vector.clone();
        let mut stop = self.stop;

        while stop < vector.len() {
            let Some(item) = items.next() else {
                break;
            };
            vector = vector.replace(stop, item);
            stop += 1;
        }

        let before = vector.len();
        let vector = vector.append(items);
        stop += vector.len() - before;

        Self {
            vector,
            start: self.start,
            stop,
        }
    }

    /// Copies the window into a standard `Vec`, preserving order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for VectorView<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<PersistentVector<T>> for VectorView<T> {
    fn from(vector: PersistentVector<T>) -> Self {
        let stop = vector.len();
        Self::from_parts(vector, 0, stop)
    }
}

impl<T: Clone> FromIterator<T> for VectorView<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        PersistentVector::from_iter(iter).into()
    }
}

impl<'a, T> IntoIterator for &'a VectorView<T> {
    type Item = &'a T;
    type IntoIter = PersistentVectorIterator<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for VectorView<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<T: Eq> Eq for VectorView<T> {}

impl<T: fmt::Debug> fmt::Debug for VectorView<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for VectorView<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_display_list(formatter, self.iter())
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for VectorView<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for VectorView<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        <PersistentVector<T> as serde::Deserialize<'de>>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::CollectionError;
    use rstest::rstest;

    fn window(size: usize, start: usize, stop: usize) -> VectorView<usize> {
        (0..size)
            .collect::<PersistentVector<usize>>()
            .slice(start, stop)
            .unwrap()
    }

    #[rstest]
    fn test_slice_indexes() {
        let view = window(20, 5, 15);
        assert_eq!(view.len(), 10);
        for index in 0..10 {
            assert_eq!(view.get(index), Ok(&(index + 5)));
        }
    }

    #[rstest]
    fn test_get_past_window_fails_even_inside_backing() {
        let view = window(20, 5, 15);
        assert_eq!(
            view.get(10),
            Err(CollectionError::IndexOutOfBounds {
                index: 10,
                length: 10
            })
        );
    }

    #[rstest]
    fn test_set_keeps_window_and_original() {
        let view = window(20, 5, 15);
        let updated = view.set(0, 1000).unwrap();
        assert_eq!(updated.get(0), Ok(&1000));
        assert_eq!(updated.start(), 5);
        assert_eq!(updated.stop(), 15);
        assert_eq!(view.get(0), Ok(&5));
        assert!(view.set(10, 0).is_err());
    }

    #[rstest]
    fn test_append_in_middle_overwrites_backing_slots() {
        let view = window(20, 0, 10);
        let appended = view.append([100, 101]);
        assert_eq!(appended.len(), 12);
        assert_eq!(appended.backing().len(), 20);
        assert_eq!(appended.get(10), Ok(&100));
        assert_eq!(appended.get(11), Ok(&101));
        assert_eq!(appended.backing().get(12), Ok(&12));
        assert_eq!(view.backing().get(10), Ok(&10));
    }

    #[rstest]
    fn test_append_at_end_grows_backing() {
        let view = window(20, 10, 20);
        let appended = view.append([100, 101]);
        assert_eq!(appended.len(), 12);
        assert_eq!(appended.backing().len(), 22);
        assert_eq!(appended.get(11), Ok(&101));
    }

    #[rstest]
    fn test_append_across_backing_end() {
        let view = window(20, 0, 18);
        let appended = view.append([100, 101, 102, 103]);
        assert_eq!(appended.len(), 22);
        assert_eq!(appended.backing().len(), 22);
        assert_eq!(appended.to_vec()[18..], [100, 101, 102, 103]);
    }

    #[rstest]
    fn test_slice_of_slice_bounds() {
        let view = window(20, 5, 15);
        assert_eq!(
            view.slice(2, 1).err(),
            Some(CollectionError::SliceStartAfterStop { start: 2, stop: 1 })
        );
        assert_eq!(
            view.slice(0, 11).err(),
            Some(CollectionError::SliceOutOfRange {
                start: 0,
                stop: 11,
                length: 10
            })
        );
        let inner = view.slice(3, 7).unwrap();
        assert_eq!(inner.to_vec(), vec![8, 9, 10, 11]);
    }

    #[rstest]
    fn test_iteration_across_leaf_boundaries() {
        let view = window(200, 30, 100);
        let collected: Vec<usize> = view.iter().copied().collect();
        assert_eq!(collected, (30..100).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_range_stops_early() {
        let view = window(100, 10, 90);
        let mut visited = 0;
        let flow = view.range(|element| {
            visited += 1;
            if *element == 14 {
                ControlFlow::Break(*element)
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(14));
        assert_eq!(visited, 5);
    }

    #[rstest]
    fn test_from_iter_covers_everything() {
        let view: VectorView<i32> = (1..=3).collect();
        assert_eq!(view.start(), 0);
        assert_eq!(view.stop(), 3);
        assert_eq!(format!("{view}"), "[1, 2, 3]");
    }
}
