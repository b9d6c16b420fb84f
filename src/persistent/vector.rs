//! Persistent (immutable) vector based on a bit-partitioned trie.
//!
//! This module provides [`PersistentVector`], an immutable index-addressable
//! sequence that uses structural sharing for cheap versioning.
//!
//! # Overview
//!
//! `PersistentVector` is a 32-way branching trie in the style of Clojure's
//! `PersistentVector`. It provides:
//!
//! - O(log32 N) random access (effectively O(1) for practical sizes)
//! - O(log32 N) `append`, amortized O(1) thanks to the tail buffer
//! - O(log32 N) `set` by path copying
//! - O(1) `len`, `is_empty` and `slice`
//!
//! Every mutator returns a new vector. Only the nodes on the touched path are
//! copied, every other subtree is shared by reference with the original.
//!
//! # Internal Structure
//!
//! The vector consists of:
//! - A root node (32-way branching trie) holding every full leaf
//! - A tail buffer (up to 32 elements) for the most recent appends
//!
//! Elements with an index below the tail offset live in the trie, the rest
//! live in the tail. The tail is committed to the trie as a whole leaf once
//! it is full.
//!
//! # Examples
//!
//! ```rust
//! use cowtrie::persistent::PersistentVector;
//!
//! let vector = PersistentVector::new().append([1, 2, 3]);
//! let extended = vector.append([4]);
//!
//! assert_eq!(vector.len(), 3);   // Original unchanged
//! assert_eq!(extended.len(), 4); // New vector
//! assert_eq!(extended.get(3), Ok(&4));
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::ops::ControlFlow;

use super::ReferenceCounter;
use super::VectorView;
use super::error::{CollectionError, CollectionResult, check_index, check_window};

// =============================================================================
// Constants
// =============================================================================

/// Branching factor (2^5 = 32)
const BRANCHING_FACTOR: usize = 32;

/// Bits per level in the trie
const BITS_PER_LEVEL: usize = 5;

/// Bit mask for extracting index within a node
const MASK: usize = BRANCHING_FACTOR - 1;

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node structure for the trie.
///
/// Nodes are never mutated once they are reachable from a published vector.
enum Node<T> {
    /// Branch node holding up to 32 children, packed from the left
    Branch(Vec<ReferenceCounter<Self>>),
    /// Leaf node holding exactly 32 committed elements
    Leaf(ReferenceCounter<[T]>),
}

impl<T> Node<T> {
    /// Creates the empty root used by vectors whose elements all fit in the tail.
    fn empty_branch() -> ReferenceCounter<Self> {
        ReferenceCounter::new(Self::Branch(Vec::new()))
    }

    /// Returns the children of a branch, or nothing for a leaf.
    #[inline]
    fn children(&self) -> &[ReferenceCounter<Self>] {
        match self {
            Self::Branch(children) => children,
            Self::Leaf(_) => &[],
        }
    }

    /// Returns the elements of a leaf, or nothing for a branch.
    #[inline]
    fn elements(&self) -> &[T] {
        match self {
            Self::Branch(_) => &[],
            Self::Leaf(elements) => elements,
        }
    }
}

// =============================================================================
// PersistentVector Definition
// =============================================================================

/// A persistent (immutable) vector based on a 32-way bit-partitioned trie.
///
/// # Time Complexity
///
/// | Operation    | Complexity                    |
/// |--------------|-------------------------------|
/// | `new`        | O(1)                          |
/// | `get`        | O(log32 N)                    |
/// | `set`        | O(log32 N)                    |
/// | `append`     | O(M log32 N) amortized O(M)   |
/// | `slice`      | O(1)                          |
/// | `len`        | O(1)                          |
/// | `iter`       | O(1) to create, O(N) to iterate |
///
/// # Examples
///
/// ```rust
/// use cowtrie::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (0..100).collect();
/// let updated = vector.set(50, 999).unwrap();
///
/// assert_eq!(vector.get(50), Ok(&50));    // Original unchanged
/// assert_eq!(updated.get(50), Ok(&999)); // New version
/// ```
pub struct PersistentVector<T> {
    /// Total number of elements
    length: usize,
    /// Shift amount for index calculation: (depth - 1) * `BITS_PER_LEVEL`
    shift: usize,
    /// Root node of the trie
    root: ReferenceCounter<Node<T>>,
    /// Tail buffer for efficient append (up to 32 elements)
    tail: ReferenceCounter<[T]>,
}

impl<T> Clone for PersistentVector<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            length: self.length,
            shift: self.shift,
            root: self.root.clone(),
            tail: self.tail.clone(),
        }
    }
}

impl<T> PersistentVector<T> {
    /// Creates a new empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = PersistentVector::new();
    /// assert!(vector.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            length: 0,
            shift: BITS_PER_LEVEL,
            root: Node::empty_branch(),
            tail: ReferenceCounter::from(Vec::<T>::new()),
        }
    }

    /// Creates a vector containing a single element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::singleton(42);
    /// assert_eq!(vector.len(), 1);
    /// assert_eq!(vector.get(0), Ok(&42));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self {
            length: 1,
            shift: BITS_PER_LEVEL,
            root: Node::empty_branch(),
            tail: ReferenceCounter::from(vec![element]),
        }
    }

    /// Returns the number of elements in the vector.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the vector contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the starting index of the tail buffer.
    #[inline]
    const fn tail_offset(&self) -> usize {
        if self.length < BRANCHING_FACTOR {
            0
        } else {
            ((self.length - 1) >> BITS_PER_LEVEL) << BITS_PER_LEVEL
        }
    }

    /// Returns the leaf (or the tail) holding the element at `index`.
    ///
    /// The returned slice is addressed with `index & MASK`. `index` must be
    /// below `len()`.
    fn leaf_for(&self, index: usize) -> &[T] {
        if index >= self.tail_offset() {
            return &self.tail;
        }

        let mut node = &self.root;
        let mut level = self.shift;
        while level > 0 {
            match node.children().get((index >> level) & MASK) {
                Some(child) => node = child,
                None => return &[],
            }
            level -= BITS_PER_LEVEL;
        }
        node.elements()
    }

    /// Returns a reference to the element at the given index.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`](super::CollectionError::IndexOutOfBounds)
    /// if `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::{CollectionError, PersistentVector};
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.get(0), Ok(&1));
    /// assert_eq!(vector.get(4), Ok(&5));
    /// assert!(matches!(vector.get(5), Err(CollectionError::IndexOutOfBounds { .. })));
    /// ```
    pub fn get(&self, index: usize) -> CollectionResult<&T> {
        check_index(index, self.length)?;
        self.leaf_for(index)
            .get(index & MASK)
            .ok_or(CollectionError::IndexOutOfBounds {
                index,
                length: self.length,
            })
    }

    /// Returns a reference to the first element, or `None` if empty.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0).ok()
    }

    /// Returns a reference to the last element, or `None` if empty.
    ///
    /// # Complexity
    ///
    /// O(1) - the last element is always in the tail
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.tail.last()
    }

    /// Returns an iterator over references to the elements.
    ///
    /// The iterator resolves one leaf per 32 elements, so a full traversal
    /// costs O(N).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let collected: Vec<&i32> = vector.iter().collect();
    /// assert_eq!(collected, vec![&1, &2, &3, &4, &5]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentVectorIterator<'_, T> {
        PersistentVectorIterator::new(self, 0, self.length)
    }

    /// Visits every element in index order until `visit` breaks.
    ///
    /// Once `visit` returns [`ControlFlow::Break`], no further element is
    /// visited and the break value is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    /// use std::ops::ControlFlow;
    ///
    /// let vector: PersistentVector<i32> = (0..100).collect();
    /// let mut visited = 0;
    /// let found = vector.range(|element| {
    ///     visited += 1;
    ///     if *element == 9 { ControlFlow::Break(*element) } else { ControlFlow::Continue(()) }
    /// });
    ///
    /// assert_eq!(found, ControlFlow::Break(9));
    /// assert_eq!(visited, 10);
    /// ```
    pub fn range<B, F>(&self, visit: F) -> ControlFlow<B>
    where
        F: FnMut(&T) -> ControlFlow<B>,
    {
        self.iter().try_for_each(visit)
    }

    /// Returns `true` if both vectors are the same version, holding the very
    /// same root and tail.
    #[inline]
    pub(crate) fn shares_storage_with(&self, other: &Self) -> bool {
        self.length == other.length
            && ReferenceCounter::ptr_eq(&self.root, &other.root)
            && ReferenceCounter::ptr_eq(&self.tail, &other.tail)
    }

    /// Returns a view of the elements in `[start, stop)`.
    ///
    /// The view shares this vector's storage; no element is copied.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::SliceStartAfterStop`](super::CollectionError::SliceStartAfterStop)
    /// if `start > stop` and
    /// [`CollectionError::SliceOutOfRange`](super::CollectionError::SliceOutOfRange)
    /// if `stop > len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..10).collect();
    /// let view = vector.slice(2, 5).unwrap();
    /// assert_eq!(view.to_vec(), vec![2, 3, 4]);
    /// ```
    pub fn slice(&self, start: usize, stop: usize) -> CollectionResult<VectorView<T>> {
        check_window(start, stop, self.length)?;
        Ok(VectorView::from_parts(self.clone(), start, stop))
    }
}

impl<T: Clone> PersistentVector<T> {
    /// Appends every item to the back of the vector.
    ///
    /// Items are copied into the tail buffer in batches of at most 32. Each
    /// time the tail fills up it is committed to the trie as a new leaf,
    /// copying only the path from the root to the insertion point.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=3).collect();
    /// let extended = vector.append(4..=6);
    ///
    /// assert_eq!(extended.len(), 6);
    /// assert_eq!(extended.to_vec(), vec![1, 2, 3, 4, 5, 6]);
    /// ```
    #[must_use]
    pub fn append<I>(&self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut items = items.into_iter().peekable();
        let mut result = self.clone();

        while items.peek().is_some() {
            if result.tail.len() == BRANCHING_FACTOR {
                result = result.commit_tail();
            }

            let free = BRANCHING_FACTOR - result.tail.len();
            let mut new_tail: Vec<T> = Vec::with_capacity(BRANCHING_FACTOR);
            new_tail.extend_from_slice(&result.tail);
            new_tail.extend(items.by_ref().take(free));
            let added = new_tail.len() - result.tail.len();

            result = Self {
                length: result.length + added,
                shift: result.shift,
                root: result.root,
                tail: ReferenceCounter::from(new_tail),
            };
        }

        result
    }

    /// Appends a single element to the back of the vector.
    #[inline]
    #[must_use]
    pub fn push_back(&self, element: T) -> Self {
        self.append(std::iter::once(element))
    }

    /// Moves a full tail into the trie, leaving an empty tail.
    ///
    /// The result keeps `length` unchanged, so it is only a valid vector once
    /// the caller has appended at least one more element.
    fn commit_tail(&self) -> Self {
        let tail_leaf = ReferenceCounter::new(Node::Leaf(self.tail.clone()));

        // Root overflow: every slot reachable at the current height is taken
        let (root, shift) = if (self.length >> BITS_PER_LEVEL) > (1 << self.shift) {
            tracing::trace!(
                length = self.length,
                shift = self.shift + BITS_PER_LEVEL,
                "persistent vector trie grew one level"
            );
            let path = Self::new_path(self.shift, tail_leaf);
            let root = ReferenceCounter::new(Node::Branch(vec![self.root.clone(), path]));
            (root, self.shift + BITS_PER_LEVEL)
        } else {
            let root = Self::push_tail(self.length, self.shift, &self.root, tail_leaf);
            (root, self.shift)
        };

        Self {
            length: self.length,
            shift,
            root,
            tail: ReferenceCounter::from(Vec::<T>::new()),
        }
    }

    /// Wraps `node` in single-child branches until it sits `level` bits deep.
    fn new_path(level: usize, node: ReferenceCounter<Node<T>>) -> ReferenceCounter<Node<T>> {
        if level == 0 {
            node
        } else {
            let child = Self::new_path(level - BITS_PER_LEVEL, node);
            ReferenceCounter::new(Node::Branch(vec![child]))
        }
    }

    /// Copies the rightmost path of `parent` with `tail_leaf` attached.
    fn push_tail(
        length: usize,
        level: usize,
        parent: &ReferenceCounter<Node<T>>,
        tail_leaf: ReferenceCounter<Node<T>>,
    ) -> ReferenceCounter<Node<T>> {
        let subindex = ((length - 1) >> level) & MASK;
        let mut children = parent.children().to_vec();

        let child = if level == BITS_PER_LEVEL {
            tail_leaf
        } else if let Some(existing) = children.get(subindex) {
            Self::push_tail(length, level - BITS_PER_LEVEL, existing, tail_leaf)
        } else {
            Self::new_path(level - BITS_PER_LEVEL, tail_leaf)
        };

        if subindex < children.len() {
            children[subindex] = child;
        } else {
            children.push(child);
        }
        ReferenceCounter::new(Node::Branch(children))
    }

    /// Returns a new vector with the element at `index` replaced by `element`.
    ///
    /// Only the nodes on the path from the root to the affected leaf are
    /// copied. If the element lives in the tail, only the tail is copied.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`](super::CollectionError::IndexOutOfBounds)
    /// if `index >= len()`. Nothing is allocated in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let updated = vector.set(2, 100).unwrap();
    ///
    /// assert_eq!(updated.get(2), Ok(&100));
    /// assert_eq!(vector.get(2), Ok(&3)); // Original unchanged
    /// assert!(vector.set(5, 0).is_err());
    /// ```
    pub fn set(&self, index: usize, element: T) -> CollectionResult<Self> {
        check_index(index, self.length)?;
        Ok(self.replace(index, element))
    }

    /// Path-copying replacement for an index already known to be in bounds.
    pub(crate) fn replace(&self, index: usize, element: T) -> Self {
        if index >= self.tail_offset() {
            let mut new_tail = self.tail.to_vec();
            if let Some(slot) = new_tail.get_mut(index & MASK) {
                *slot = element;
            }

            Self {
                length: self.length,
                shift: self.shift,
                root: self.root.clone(),
                tail: ReferenceCounter::from(new_tail),
            }
        } else {
            Self {
                length: self.length,
                shift: self.shift,
                root: Self::assoc(&self.root, self.shift, index, element),
                tail: self.tail.clone(),
            }
        }
    }

    /// Copies the path to `index`, storing `element` in the copied leaf.
    fn assoc(
        node: &ReferenceCounter<Node<T>>,
        level: usize,
        index: usize,
        element: T,
    ) -> ReferenceCounter<Node<T>> {
        match node.as_ref() {
            Node::Leaf(elements) => {
                let mut new_elements = elements.to_vec();
                if let Some(slot) = new_elements.get_mut(index & MASK) {
                    *slot = element;
                }
                ReferenceCounter::new(Node::Leaf(ReferenceCounter::from(new_elements)))
            }
            Node::Branch(children) => {
                let subindex = (index >> level) & MASK;
                let mut new_children = children.clone();
                if let Some(child) = children.get(subindex) {
                    new_children[subindex] =
                        Self::assoc(child, level - BITS_PER_LEVEL, index, element);
                }
                ReferenceCounter::new(Node::Branch(new_children))
            }
        }
    }

    /// Copies every element into a standard `Vec`, preserving order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowtrie::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new().append(vec!["a", "b"]);
    /// assert_eq!(vector.to_vec(), vec!["a", "b"]);
    /// ```
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.length);
        let mut index = 0;
        while index < self.length {
            let leaf = self.leaf_for(index);
            result.extend_from_slice(leaf);
            index += BRANCHING_FACTOR;
        }
        result
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over references to the elements of a [`PersistentVector`]
/// (or of a window over one).
pub struct PersistentVectorIterator<'a, T> {
    vector: &'a PersistentVector<T>,
    /// Index of the next element to yield
    index: usize,
    /// One past the last index to yield
    end: usize,
    /// Leaf holding `index`, resolved lazily at leaf boundaries
    leaf: &'a [T],
}

impl<'a, T> PersistentVectorIterator<'a, T> {
    pub(crate) fn new(vector: &'a PersistentVector<T>, start: usize, end: usize) -> Self {
        Self {
            vector,
            index: start,
            end,
            leaf: &[],
        }
    }
}

impl<'a, T> Iterator for PersistentVectorIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }

        if self.index & MASK == 0 || self.leaf.is_empty() {
            self.leaf = self.vector.leaf_for(self.index);
        }

        let element = self.leaf.get(self.index & MASK);
        self.index += 1;
        element
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for PersistentVectorIterator<'_, T> {}

/// An owning iterator over the elements of a [`PersistentVector`].
///
/// Elements are cloned out of the shared storage.
pub struct PersistentVectorIntoIterator<T> {
    vector: PersistentVector<T>,
    index: usize,
}

impl<T: Clone> Iterator for PersistentVectorIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.vector.get(self.index).ok()?.clone();
        self.index += 1;
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.vector.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for PersistentVectorIntoIterator<T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for PersistentVector<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new().append(iter)
    }
}

impl<T: Clone> From<Vec<T>> for PersistentVector<T> {
    fn from(elements: Vec<T>) -> Self {
        Self::new().append(elements)
    }
}

impl<T: Clone> From<&[T]> for PersistentVector<T> {
    fn from(elements: &[T]) -> Self {
        Self::new().append(elements.iter().cloned())
    }
}

impl<T: Clone> IntoIterator for PersistentVector<T> {
    type Item = T;
    type IntoIter = PersistentVectorIntoIterator<T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        PersistentVectorIntoIterator {
            vector: self,
            index: 0,
        }
    }
}

impl<'a, T> IntoIterator for &'a PersistentVector<T> {
    type Item = &'a T;
    type IntoIter = PersistentVectorIterator<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for PersistentVector<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        if self.shares_storage_with(other) {
            return true;
        }
        self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

/// Hashes the length first, then every element in order, so equal vectors
/// hash equally.
impl<T: Hash> Hash for PersistentVector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        for element in self {
            element.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_display_list(formatter, self.iter())
    }
}

/// Writes `[a, b, c]` using each element's `Display`.
pub(crate) fn write_display_list<'a, T, I>(
    formatter: &mut fmt::Formatter<'_>,
    elements: I,
) -> fmt::Result
where
    T: fmt::Display + 'a,
    I: Iterator<Item = &'a T>,
{
    write!(formatter, "[")?;
    for (position, element) in elements.enumerate() {
        if position > 0 {
            write!(formatter, ", ")?;
        }
        write!(formatter, "{element}")?;
    }
    write!(formatter, "]")
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PersistentVector<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(feature = "serde")]
struct PersistentVectorVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<T> PersistentVectorVisitor<T> {
    const fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentVectorVisitor<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentVector<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        const MAX_PREALLOCATE: usize = 4096;
        let capacity = seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATE);
        let mut elements = Vec::with_capacity(capacity);
        while let Some(element) = seq.next_element()? {
            elements.push(element);
        }
        Ok(elements.into())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentVector<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentVectorVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Walks the trie and checks the shape the append algorithm promises.
    fn assert_well_formed<T>(vector: &PersistentVector<T>) {
        fn count<T>(node: &Node<T>, level: usize) -> usize {
            match node {
                Node::Leaf(elements) => {
                    assert_eq!(level, 0, "leaf found above the bottom level");
                    assert_eq!(elements.len(), BRANCHING_FACTOR, "partial leaf in trie");
                    elements.len()
                }
                Node::Branch(children) => {
                    assert!(level > 0, "branch found at the leaf level");
                    assert!(children.len() <= BRANCHING_FACTOR);
                    children
                        .iter()
                        .map(|child| count(child, level - BITS_PER_LEVEL))
                        .sum()
                }
            }
        }

        let in_trie = count(&vector.root, vector.shift);
        assert_eq!(in_trie, vector.tail_offset().min(vector.length));
        assert_eq!(in_trie + vector.tail.len(), vector.length);
        assert!(vector.tail.len() <= BRANCHING_FACTOR);
        if vector.length > 0 {
            assert!(!vector.tail.is_empty(), "published vector with empty tail");
        }
    }

    // =========================================================================
    // Display Tests
    // =========================================================================

    #[rstest]
    fn test_display_empty_vector() {
        let vector: PersistentVector<i32> = PersistentVector::new();
        assert_eq!(format!("{vector}"), "[]");
    }

    #[rstest]
    fn test_display_multiple_elements_vector() {
        let vector: PersistentVector<i32> = (1..=3).collect();
        assert_eq!(format!("{vector}"), "[1, 2, 3]");
        assert_eq!(format!("{vector:?}"), "[1, 2, 3]");
    }

    // =========================================================================
    // Structure Tests
    // =========================================================================

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(31)]
    #[case(32)]
    #[case(33)]
    #[case(64)]
    #[case(1024)]
    #[case(1056)]
    #[case(1057)]
    #[case(32 * 32 * 32)]
    #[case(32 * 32 * 32 + 33)]
    fn test_shape_after_append(#[case] size: usize) {
        let vector: PersistentVector<usize> = (0..size).collect();
        assert_well_formed(&vector);
        assert_eq!(vector.len(), size);
        for index in 0..size {
            assert_eq!(vector.get(index), Ok(&index));
        }
    }

    #[rstest]
    fn test_shape_after_single_pushes() {
        let mut vector = PersistentVector::new();
        for index in 0..2000_usize {
            vector = vector.push_back(index);
            assert_well_formed(&vector);
        }
        assert_eq!(vector.to_vec(), (0..2000).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_height_grows_when_root_overflows() {
        let full: PersistentVector<usize> = (0..1056).collect();
        assert_eq!(full.shift, BITS_PER_LEVEL);
        let grown = full.push_back(1056);
        assert_eq!(grown.shift, 2 * BITS_PER_LEVEL);
        assert_well_formed(&grown);
        assert_eq!(full.shift, BITS_PER_LEVEL);
    }

    #[rstest]
    fn test_tail_offset() {
        let cases = [(0, 0), (1, 0), (32, 0), (33, 32), (64, 32), (65, 64)];
        for (length, expected) in cases {
            let vector: PersistentVector<usize> = (0..length).collect();
            assert_eq!(vector.tail_offset(), expected, "length {length}");
        }
    }

    // =========================================================================
    // Structural Sharing Tests
    // =========================================================================

    #[rstest]
    fn test_append_to_tail_shares_root() {
        let vector: PersistentVector<i32> = (0..40).collect();
        let extended = vector.push_back(40);
        assert!(ReferenceCounter::ptr_eq(&vector.root, &extended.root));
    }

    #[rstest]
    fn test_set_in_tail_shares_root() {
        let vector: PersistentVector<i32> = (0..40).collect();
        let updated = vector.set(35, -1).unwrap();
        assert!(ReferenceCounter::ptr_eq(&vector.root, &updated.root));
        assert!(!ReferenceCounter::ptr_eq(&vector.tail, &updated.tail));
    }

    #[rstest]
    fn test_set_in_trie_shares_siblings_and_tail() {
        let vector: PersistentVector<i32> = (0..2000).collect();
        let updated = vector.set(5, -1).unwrap();

        assert!(ReferenceCounter::ptr_eq(&vector.tail, &updated.tail));
        let old_children = vector.root.children();
        let new_children = updated.root.children();
        assert_eq!(old_children.len(), new_children.len());
        assert!(!ReferenceCounter::ptr_eq(&old_children[0], &new_children[0]));
        for (old, new) in old_children.iter().zip(new_children).skip(1) {
            assert!(ReferenceCounter::ptr_eq(old, new));
        }
    }

    #[rstest]
    fn test_commit_reuses_tail_storage() {
        let vector: PersistentVector<i32> = (0..32).collect();
        let extended = vector.push_back(32);
        let committed = extended.root.children()[0].elements();
        assert!(std::ptr::eq(committed.as_ptr(), vector.tail.as_ptr()));
    }

    // =========================================================================
    // Get / Set Tests
    // =========================================================================

    #[rstest]
    fn test_get_out_of_bounds() {
        let vector: PersistentVector<i32> = (0..10).collect();
        assert_eq!(
            vector.get(10),
            Err(CollectionError::IndexOutOfBounds {
                index: 10,
                length: 10
            })
        );
        assert!(vector.get(usize::MAX).is_err());
    }

    #[rstest]
    fn test_set_out_of_bounds() {
        let vector: PersistentVector<i32> = (0..10).collect();
        assert_eq!(
            vector.set(10, 0).err(),
            Some(CollectionError::IndexOutOfBounds {
                index: 10,
                length: 10
            })
        );
    }

    #[rstest]
    fn test_set_every_index_preserves_others() {
        let vector: PersistentVector<usize> = (0..100).collect();
        for index in 0..100 {
            let updated = vector.set(index, 1000).unwrap();
            assert_eq!(updated.get(index), Ok(&1000));
            for other in (0..100).filter(|other| *other != index) {
                assert_eq!(updated.get(other), Ok(&other));
            }
        }
        assert_eq!(vector.to_vec(), (0..100).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_first_and_last() {
        let empty: PersistentVector<i32> = PersistentVector::new();
        assert_eq!(empty.first(), None);
        assert_eq!(empty.last(), None);

        let vector: PersistentVector<i32> = (0..100).collect();
        assert_eq!(vector.first(), Some(&0));
        assert_eq!(vector.last(), Some(&99));
    }

    // =========================================================================
    // Iteration Tests
    // =========================================================================

    #[rstest]
    fn test_iter_size_hint() {
        let vector: PersistentVector<i32> = (0..70).collect();
        let mut iterator = vector.iter();
        assert_eq!(iterator.len(), 70);
        iterator.next();
        assert_eq!(iterator.len(), 69);
    }

    #[rstest]
    fn test_into_iter_owned() {
        let vector: PersistentVector<String> =
            ["a", "b", "c"].iter().map(ToString::to_string).collect();
        let collected: Vec<String> = vector.clone().into_iter().collect();
        assert_eq!(collected, vec!["a", "b", "c"]);
        assert_eq!(vector.len(), 3);
    }

    #[rstest]
    fn test_range_stops_early() {
        let vector: PersistentVector<i32> = (0..1000).collect();
        let mut visited = Vec::new();
        let flow = vector.range(|element| {
            visited.push(*element);
            if visited.len() == 40 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(visited, (0..40).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_equality_and_hash() {
        use std::collections::hash_map::DefaultHasher;

        let left: PersistentVector<i32> = (0..50).collect();
        let right = PersistentVector::new().append(0..50);
        assert_eq!(left, right);
        assert_ne!(left, right.set(3, 7).unwrap());

        let hash_of = |vector: &PersistentVector<i32>| {
            let mut hasher = DefaultHasher::new();
            vector.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash_of(&left), hash_of(&right));
    }
}
