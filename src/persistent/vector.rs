//! Persistent (immutable) vector based on a 32-way radix trie.
//!
//! This module provides [`PersistentVector`], an immutable indexed sequence
//! that uses path copying and structural sharing.
//!
//! # Overview
//!
//! `PersistentVector` stores its elements in the leaves of a trie with a
//! branching factor of 32. An index is split into 5-bit digits, most
//! significant first, and each digit selects a child on the way down. It
//! provides:
//!
//! - O(log32 N) random access (`get`)
//! - O(log32 N) `update`, `append` and `pop`
//! - O(1) `len`, `is_empty` and `clone`
//!
//! There is no tail buffer and no hidden root level: a vector with up to 32
//! elements is a single leaf, and an empty vector has no nodes at all.
//!
//! # Internal Structure
//!
//! ```text
//! length = 70, shift = 5
//!
//!             root (Branch)
//!          /       |       \
//!   Leaf[0..32] Leaf[32..64] Leaf[64..70]
//! ```
//!
//! Slots are always filled from the left, so a node is stored as a bounded
//! array of at most 32 occupied slots. Every operation that produces a new
//! version copies only the nodes on one root-to-leaf path; all sibling
//! subtrees are shared with the previous version.
//!
//! # Examples
//!
//! ```rust
//! use radixvec::persistent::PersistentVector;
//!
//! let vector = PersistentVector::new()
//!     .append(1)
//!     .append(2)
//!     .append(3);
//!
//! assert_eq!(vector.get(0), Ok(&1));
//! assert_eq!(vector.get(1), Ok(&2));
//! assert_eq!(vector.get(2), Ok(&3));
//!
//! // Structural sharing: the original vector is preserved
//! let extended = vector.append(4);
//! assert_eq!(vector.len(), 3);     // Original unchanged
//! assert_eq!(extended.len(), 4);   // New vector
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use arrayvec::ArrayVec;

use super::ReferenceCounter;
use crate::error::VectorError;

// =============================================================================
// Constants
// =============================================================================

/// Branching factor (2^5 = 32): the number of slots in every node.
pub const BRANCHING_FACTOR: usize = 32;

/// Number of index bits consumed by each level of the trie.
pub const BITS_PER_LEVEL: usize = 5;

/// Bit mask for extracting the slot index within a node.
const MASK: usize = BRANCHING_FACTOR - 1;

static_assertions::const_assert_eq!(BRANCHING_FACTOR, 1 << BITS_PER_LEVEL);

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentVector<i32>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PersistentVector<i32>: Send, Sync);

// =============================================================================
// Node Definition
// =============================================================================

type Children<T> = ArrayVec<ReferenceCounter<Node<T>>, BRANCHING_FACTOR>;
type Elements<T> = ArrayVec<T, BRANCHING_FACTOR>;

/// Internal node structure for the radix trie.
///
/// A node is never modified once a vector can reach it. New versions are
/// built from fresh nodes that point at the old, untouched children.
#[derive(Clone)]
enum Node<T> {
    /// Interior node; slot `i` holds the subtree for digit `i`
    Branch(Children<T>),
    /// Bottom node; slot `i` holds the element for digit `i`
    Leaf(Elements<T>),
}

/// Result of removing the last element below a node.
enum PopOutcome<T> {
    /// The node still holds elements and was rebuilt without the last one
    Retained(Node<T>),
    /// The removed element was the only one below the node
    Vanished,
}

impl<T> Node<T> {
    fn leaf(element: T) -> Self {
        let mut elements = Elements::new();
        elements.push(element);
        Self::Leaf(elements)
    }

    /// Builds a chain of single-child branches from `level` down to a leaf
    /// holding `element` in slot 0.
    fn path_to(level: usize, element: T) -> Self {
        if level == 0 {
            Self::leaf(element)
        } else {
            let mut children = Children::new();
            children.push(ReferenceCounter::new(Self::path_to(
                level - BITS_PER_LEVEL,
                element,
            )));
            Self::Branch(children)
        }
    }

    /// Follows the digit path of `index` from a node at `level`.
    fn lookup(&self, level: usize, index: usize) -> Option<&T> {
        let mut node = self;
        let mut level = level;

        loop {
            match node {
                Self::Branch(children) => {
                    node = children.get((index >> level) & MASK)?.as_ref();
                    level = level.checked_sub(BITS_PER_LEVEL)?;
                }
                Self::Leaf(elements) => return elements.get(index & MASK),
            }
        }
    }
}

impl<T: Clone> Node<T> {
    /// Copies the path to `index` and replaces the element at its end.
    fn with_updated(&self, level: usize, index: usize, element: T) -> Self {
        match self {
            Self::Branch(children) => {
                let mut new_children = children.clone();
                if let Some(slot) = new_children.get_mut((index >> level) & MASK) {
                    let child =
                        slot.with_updated(level.saturating_sub(BITS_PER_LEVEL), index, element);
                    *slot = ReferenceCounter::new(child);
                }
                Self::Branch(new_children)
            }
            Self::Leaf(elements) => {
                let mut new_elements = elements.clone();
                if let Some(slot) = new_elements.get_mut(index & MASK) {
                    *slot = element;
                }
                Self::Leaf(new_elements)
            }
        }
    }

    /// Copies the path to `index` (the current length), creating the nodes
    /// that do not exist yet, and stores `element` in the new slot.
    fn with_appended(&self, level: usize, index: usize, element: T) -> Self {
        match self {
            Self::Branch(children) => {
                let digit = (index >> level) & MASK;
                let child_level = level.saturating_sub(BITS_PER_LEVEL);
                let mut new_children = children.clone();

                if let Some(slot) = new_children.get_mut(digit) {
                    let child = slot.with_appended(child_level, index, element);
                    *slot = ReferenceCounter::new(child);
                } else {
                    new_children.push(ReferenceCounter::new(Self::path_to(child_level, element)));
                }
                Self::Branch(new_children)
            }
            Self::Leaf(elements) => {
                let slot = index & MASK;
                let mut new_elements: Elements<T> = elements.iter().take(slot).cloned().collect();
                new_elements.push(element);
                Self::Leaf(new_elements)
            }
        }
    }

    /// Rebuilds the path to `index` (the last element) without that element.
    ///
    /// A node vanishes when the removed element sat below its slot 0, since
    /// slots fill from the left and nothing else can remain in it.
    fn without_last(&self, level: usize, index: usize) -> PopOutcome<T> {
        match self {
            Self::Leaf(elements) => {
                let slot = index & MASK;
                if slot == 0 {
                    PopOutcome::Vanished
                } else {
                    PopOutcome::Retained(Self::Leaf(
                        elements.iter().take(slot).cloned().collect(),
                    ))
                }
            }
            Self::Branch(children) => {
                let digit = (index >> level) & MASK;
                let outcome = children.get(digit).map_or(PopOutcome::Vanished, |child| {
                    child.without_last(level.saturating_sub(BITS_PER_LEVEL), index)
                });
                let mut new_children: Children<T> =
                    children.iter().take(digit).cloned().collect();

                match outcome {
                    PopOutcome::Vanished if digit == 0 => PopOutcome::Vanished,
                    PopOutcome::Vanished => PopOutcome::Retained(Self::Branch(new_children)),
                    PopOutcome::Retained(child) => {
                        new_children.push(ReferenceCounter::new(child));
                        PopOutcome::Retained(Self::Branch(new_children))
                    }
                }
            }
        }
    }
}

/// Returns `true` when `length` is `32^k` for some `k >= 1`.
///
/// A tree holding exactly that many elements is full at every level.
const fn is_saturated(length: usize) -> bool {
    length >= BRANCHING_FACTOR
        && length.is_power_of_two()
        && (length.trailing_zeros() as usize) % BITS_PER_LEVEL == 0
}

/// Returns the height of the trie that stores `length` elements.
///
/// This is `ceil(log32(length))`, except that any non-empty vector needs at
/// least one level (its leaf), and an empty vector has height 0.
///
/// # Examples
///
/// ```rust
/// use radixvec::persistent::tree_height;
///
/// assert_eq!(tree_height(0), 0);
/// assert_eq!(tree_height(1), 1);
/// assert_eq!(tree_height(32), 1);
/// assert_eq!(tree_height(33), 2);
/// assert_eq!(tree_height(1024), 2);
/// assert_eq!(tree_height(1025), 3);
/// ```
#[must_use]
pub const fn tree_height(length: usize) -> usize {
    if length == 0 {
        return 0;
    }

    let mut height = 1;
    let mut capacity = BRANCHING_FACTOR;
    while capacity < length {
        height += 1;
        capacity = capacity.saturating_mul(BRANCHING_FACTOR);
    }
    height
}

// =============================================================================
// PersistentVector Definition
// =============================================================================

/// A persistent (immutable) vector based on a 32-way radix trie.
///
/// Each value is one version of the sequence. `update`, `append` and `pop`
/// return new versions; the receiver and every other version keep working
/// and never observe the change.
///
/// # Time Complexity
///
/// | Operation    | Complexity                    |
/// |--------------|-------------------------------|
/// | `new`        | O(1)                          |
/// | `get`        | O(log32 N)                    |
/// | `update`     | O(log32 N)                    |
/// | `append`     | O(log32 N)                    |
/// | `pop`        | O(log32 N)                    |
/// | `len`        | O(1)                          |
/// | `clone`      | O(1)                          |
/// | `iter`       | O(1) to create, O(N) to iterate |
///
/// # Examples
///
/// ```rust
/// use radixvec::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (0..100).collect();
/// assert_eq!(vector.len(), 100);
/// assert_eq!(vector.get(50), Ok(&50));
/// ```
pub struct PersistentVector<T> {
    /// Total number of elements
    length: usize,
    /// Shift amount for index calculation: (height - 1) * `BITS_PER_LEVEL`
    shift: usize,
    /// Root node of the trie, `None` exactly when the vector is empty
    root: Option<ReferenceCounter<Node<T>>>,
}

impl<T> PersistentVector<T> {
    /// Creates a new empty vector.
    ///
    /// An empty vector allocates no nodes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = PersistentVector::new();
    /// assert!(vector.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            length: 0,
            shift: 0,
            root: None,
        }
    }

    /// Creates a vector containing a single element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
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
            shift: 0,
            root: Some(ReferenceCounter::new(Node::leaf(element))),
        }
    }

    /// Returns the number of elements in the vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.len(), 5);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the vector contains no elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let empty: PersistentVector<i32> = PersistentVector::new();
    /// assert!(empty.is_empty());
    /// assert!(!empty.append(1).is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the number of levels in the trie, or 0 for an empty vector.
    ///
    /// This is derived from the stored shift and always equals
    /// [`tree_height`] of [`len`](Self::len).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<usize> = (0..32).collect();
    /// assert_eq!(vector.height(), 1);
    /// assert_eq!(vector.append(32).height(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        if self.root.is_some() {
            self.shift / BITS_PER_LEVEL + 1
        } else {
            0
        }
    }

    /// Counts the nodes on the leftmost path from the root down to a leaf.
    ///
    /// Unlike [`height`](Self::height), this walks the actual nodes, so it
    /// measures the shape that the operations built.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<usize> = (0..1025).collect();
    /// assert_eq!(vector.left_path_length(), 3);
    /// ```
    #[must_use]
    pub fn left_path_length(&self) -> usize {
        let mut length = 0;
        let mut node = self.root.as_deref();

        while let Some(current) = node {
            length += 1;
            node = match current {
                Node::Branch(children) => children.first().map(|child| &**child),
                Node::Leaf(_) => None,
            };
        }
        length
    }

    /// Returns a reference to the element at the given index.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::IndexOutOfRange`] if `index >= self.len()`.
    ///
    /// # Complexity
    ///
    /// O(log32 N), without allocation
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::error::VectorError;
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.get(0), Ok(&1));
    /// assert_eq!(vector.get(4), Ok(&5));
    /// assert!(matches!(vector.get(10), Err(VectorError::IndexOutOfRange(_))));
    /// ```
    pub fn get(&self, index: usize) -> Result<&T, VectorError> {
        if index >= self.length {
            return Err(self.index_error(index));
        }

        self.root
            .as_deref()
            .and_then(|root| root.lookup(self.shift, index))
            .ok_or_else(|| self.index_error(index))
    }

    /// Returns a reference to the first element, or `None` if empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.first(), Some(&1));
    /// assert_eq!(PersistentVector::<i32>::new().first(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0).ok()
    }

    /// Returns a reference to the last element, or `None` if empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.last(), Some(&5));
    /// assert_eq!(PersistentVector::<i32>::new().last(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.get(self.length.checked_sub(1)?).ok()
    }

    /// Returns an iterator over references to the elements, front to back.
    ///
    /// The iterator visits every node once, so a full pass is O(N).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let collected: Vec<&i32> = vector.iter().collect();
    /// assert_eq!(collected, vec![&1, &2, &3, &4, &5]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentVectorIterator<'_, T> {
        PersistentVectorIterator::new(self)
    }

    fn index_error(&self, index: usize) -> VectorError {
        #[cfg(feature = "tracing")]
        tracing::debug!(index, length = self.length, "index out of range");

        VectorError::index_out_of_range(index, self.length)
    }
}

impl<T: Clone> PersistentVector<T> {
    /// Returns a new vector with the element at `index` replaced.
    ///
    /// Only the nodes on the path to `index` are copied; the receiver is
    /// left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::IndexOutOfRange`] if `index >= self.len()`.
    /// Nothing is allocated in that case.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let updated = vector.update(2, 100)?;
    ///
    /// assert_eq!(updated.get(2), Ok(&100));
    /// assert_eq!(vector.get(2), Ok(&3)); // Original unchanged
    /// # Ok::<(), radixvec::error::VectorError>(())
    /// ```
    pub fn update(&self, index: usize, element: T) -> Result<Self, VectorError> {
        if index >= self.length {
            return Err(self.index_error(index));
        }

        let root = self.root.as_ref().ok_or_else(|| self.index_error(index))?;

        Ok(Self {
            length: self.length,
            shift: self.shift,
            root: Some(ReferenceCounter::new(root.with_updated(
                self.shift, index, element,
            ))),
        })
    }

    /// Returns a new vector with `element` added at the end.
    ///
    /// When the trie is completely full (the length is `32^k`), a new root
    /// is created above the old one and the tree grows by one level.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new()
    ///     .append(1)
    ///     .append(2)
    ///     .append(3);
    ///
    /// assert_eq!(vector.len(), 3);
    /// assert_eq!(vector.get(2), Ok(&3));
    /// ```
    #[must_use]
    pub fn append(&self, element: T) -> Self {
        let Some(root) = &self.root else {
            return Self::singleton(element);
        };

        if is_saturated(self.length) {
            let shift = self.shift + BITS_PER_LEVEL;

            #[cfg(feature = "tracing")]
            tracing::trace!(length = self.length + 1, shift, "tree grew one level");

            let mut children = Children::new();
            children.push(root.clone());
            children.push(ReferenceCounter::new(Node::path_to(self.shift, element)));

            return Self {
                length: self.length + 1,
                shift,
                root: Some(ReferenceCounter::new(Node::Branch(children))),
            };
        }

        Self {
            length: self.length + 1,
            shift: self.shift,
            root: Some(ReferenceCounter::new(root.with_appended(
                self.shift,
                self.length,
                element,
            ))),
        }
    }

    /// Appends every element of `iter`, returning the final version.
    ///
    /// Equivalent to calling [`append`](Self::append) once per element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=3).collect();
    /// let extended = vector.append_many(4..=6);
    ///
    /// assert_eq!(extended.len(), 6);
    /// assert_eq!(vector.len(), 3);
    /// ```
    #[must_use]
    pub fn append_many<I>(&self, iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        iter.into_iter()
            .fold(self.clone(), |vector, element| vector.append(element))
    }

    /// Returns a new vector without the last element.
    ///
    /// Nodes that become empty are dropped from the new version. When the
    /// remaining length is `32^k`, the root's first subtree becomes the new
    /// root and the tree shrinks by one level.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::InvalidOperation`] if the vector is empty.
    /// Nothing is allocated in that case.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use radixvec::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// let remaining = vector.pop()?;
    ///
    /// assert_eq!(remaining.len(), 4);
    /// assert_eq!(remaining.last(), Some(&4));
    /// assert!(PersistentVector::<i32>::new().pop().is_err());
    /// # Ok::<(), radixvec::error::VectorError>(())
    /// ```
    pub fn pop(&self) -> Result<Self, VectorError> {
        let Some(root) = &self.root else {
            #[cfg(feature = "tracing")]
            tracing::debug!("pop on an empty vector");

            return Err(VectorError::empty_vector("pop"));
        };

        if self.length == 1 {
            return Ok(Self::new());
        }

        let length = self.length - 1;

        if is_saturated(length)
            && let Node::Branch(children) = root.as_ref()
            && let Some(first) = children.first()
        {
            let shift = self.shift.saturating_sub(BITS_PER_LEVEL);

            #[cfg(feature = "tracing")]
            tracing::trace!(length, shift, "tree shrank one level");

            return Ok(Self {
                length,
                shift,
                root: Some(first.clone()),
            });
        }

        let root = match root.without_last(self.shift, length) {
            PopOutcome::Retained(node) => Some(ReferenceCounter::new(node)),
            PopOutcome::Vanished => None,
        };
        debug_assert!(root.is_some(), "only a single-element vector can vanish");

        Ok(Self {
            length,
            shift: self.shift,
            root,
        })
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// A stack entry for tree traversal.
///
/// Holds a branch node's children and the index of the next child to visit.
struct TraversalStackEntry<'a, T> {
    children: &'a [ReferenceCounter<Node<T>>],
    child_index: usize,
}

/// An iterator over references to elements of a [`PersistentVector`].
///
/// Uses a stack-based depth-first traversal, caching the current leaf, so
/// each node is visited once.
pub struct PersistentVectorIterator<'a, T> {
    /// Branches on the path to the current leaf
    traversal_stack: Vec<TraversalStackEntry<'a, T>>,
    /// Elements of the current leaf
    current_leaf: &'a [T],
    /// Next position within the current leaf
    leaf_index: usize,
    /// Number of elements not yet returned (for `ExactSizeIterator`)
    remaining: usize,
}

impl<'a, T> PersistentVectorIterator<'a, T> {
    fn new(vector: &'a PersistentVector<T>) -> Self {
        let mut iterator = Self {
            traversal_stack: Vec::with_capacity(vector.height()),
            current_leaf: &[],
            leaf_index: 0,
            remaining: vector.length,
        };

        match vector.root.as_deref() {
            Some(Node::Branch(children)) => iterator.traversal_stack.push(TraversalStackEntry {
                children: children.as_slice(),
                child_index: 0,
            }),
            Some(Node::Leaf(elements)) => iterator.current_leaf = elements.as_slice(),
            None => {}
        }

        iterator
    }

    /// Backtracks through the stack to the next unvisited leaf.
    ///
    /// Returns `false` once the whole tree has been visited.
    fn advance_to_next_leaf(&mut self) -> bool {
        while let Some(entry) = self.traversal_stack.last_mut() {
            let children = entry.children;
            let index = entry.child_index;
            entry.child_index += 1;

            match children.get(index).map(|child| &**child) {
                Some(Node::Branch(grandchildren)) => {
                    self.traversal_stack.push(TraversalStackEntry {
                        children: grandchildren.as_slice(),
                        child_index: 0,
                    });
                }
                Some(Node::Leaf(elements)) => {
                    self.current_leaf = elements.as_slice();
                    self.leaf_index = 0;
                    return true;
                }
                None => {
                    self.traversal_stack.pop();
                }
            }
        }
        false
    }
}

impl<'a, T> Iterator for PersistentVectorIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(element) = self.current_leaf.get(self.leaf_index) {
                self.leaf_index += 1;
                self.remaining -= 1;
                return Some(element);
            }
            if !self.advance_to_next_leaf() {
                return None;
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for PersistentVectorIterator<'_, T> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<T> std::iter::FusedIterator for PersistentVectorIterator<'_, T> {}

/// An owning iterator over elements of a [`PersistentVector`].
///
/// Nodes that are not shared with any other version are taken apart and
/// their elements moved out; shared nodes are cloned.
pub struct PersistentVectorIntoIterator<T> {
    /// Remaining children of each branch on the path to the current leaf
    traversal_stack: Vec<arrayvec::IntoIter<ReferenceCounter<Node<T>>, BRANCHING_FACTOR>>,
    /// Remaining elements of the current leaf
    current_leaf: arrayvec::IntoIter<T, BRANCHING_FACTOR>,
    /// Number of elements not yet returned
    remaining: usize,
}

impl<T: Clone> PersistentVectorIntoIterator<T> {
    fn new(vector: PersistentVector<T>) -> Self {
        let mut iterator = Self {
            traversal_stack: Vec::with_capacity(vector.height()),
            current_leaf: Elements::new().into_iter(),
            remaining: vector.length,
        };

        if let Some(root) = vector.root {
            iterator.enter(root);
        }

        iterator
    }

    /// Makes `node` the next node to be visited.
    ///
    /// Returns `true` if it was a leaf.
    fn enter(&mut self, node: ReferenceCounter<Node<T>>) -> bool {
        match ReferenceCounter::unwrap_or_clone(node) {
            Node::Branch(children) => {
                self.traversal_stack.push(children.into_iter());
                false
            }
            Node::Leaf(elements) => {
                self.current_leaf = elements.into_iter();
                true
            }
        }
    }

    fn advance_to_next_leaf(&mut self) -> bool {
        while let Some(children) = self.traversal_stack.last_mut() {
            match children.next() {
                Some(child) => {
                    if self.enter(child) {
                        return true;
                    }
                }
                None => {
                    self.traversal_stack.pop();
                }
            }
        }
        false
    }
}

impl<T: Clone> Iterator for PersistentVectorIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(element) = self.current_leaf.next() {
                self.remaining -= 1;
                return Some(element);
            }
            if !self.advance_to_next_leaf() {
                return None;
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Clone> ExactSizeIterator for PersistentVectorIntoIterator<T> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<T: Clone> std::iter::FusedIterator for PersistentVectorIntoIterator<T> {}

// =============================================================================
// Bulk Construction
// =============================================================================

/// Builds a vector bottom-up: elements are packed into full leaves, then
/// groups of 32 nodes are packed into branches until one root remains.
///
/// The result has exactly the shape that repeated `append` would produce.
fn build_persistent_vector<T, I>(mut iter: I) -> PersistentVector<T>
where
    I: Iterator<Item = T>,
{
    let mut length = 0;
    let mut level: Vec<ReferenceCounter<Node<T>>> = Vec::new();

    loop {
        let elements: Elements<T> = iter.by_ref().take(BRANCHING_FACTOR).collect();
        if elements.is_empty() {
            break;
        }
        length += elements.len();
        level.push(ReferenceCounter::new(Node::Leaf(elements)));
    }

    let mut shift = 0;
    while level.len() > 1 {
        level = level
            .chunks(BRANCHING_FACTOR)
            .map(|chunk| ReferenceCounter::new(Node::Branch(chunk.iter().cloned().collect())))
            .collect();
        shift += BITS_PER_LEVEL;
    }

    match level.pop() {
        Some(root) => PersistentVector {
            length,
            shift,
            root: Some(root),
        },
        None => PersistentVector::new(),
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Clone for PersistentVector<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            length: self.length,
            shift: self.shift,
            root: self.root.clone(),
        }
    }
}

impl<T> Default for PersistentVector<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        build_persistent_vector(iter.into_iter())
    }
}

impl<T: Clone> IntoIterator for PersistentVector<T> {
    type Item = T;
    type IntoIter = PersistentVectorIntoIterator<T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        PersistentVectorIntoIterator::new(self)
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
        self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

/// Hashes the length followed by every element in order, so equal vectors
/// hash equally regardless of how their trees were built.
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
        write!(formatter, "[")?;
        let mut first = true;
        for element in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "]")
    }
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
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(element)?;
        }
        seq.end()
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
    T: serde::Deserialize<'de>,
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
        Ok(elements.into_iter().collect())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentVector<T>
where
    T: serde::Deserialize<'de>,
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


// =============================================================================
// Thread Safety Tests (arc feature only)
// =============================================================================


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_serialize_empty() {
        let vector: PersistentVector<i32> = PersistentVector::new();
        let json = serde_json::to_string(&vector).unwrap();
        assert_eq!(json, "[]");
    }

    #[rstest]
    fn test_serialize_multiple_elements() {
        let vector: PersistentVector<i32> = (1..=3).collect();
        let json = serde_json::to_string(&vector).unwrap();
        assert_eq!(json, "[1,2,3]");
    }

    #[rstest]
    fn test_deserialize_builds_well_formed_tree() {
        let json = serde_json::to_string(&(0..1500).collect::<Vec<i32>>()).unwrap();
        let vector: PersistentVector<i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(vector.len(), 1500);
        assert_eq!(vector.height(), 3);
        assert_eq!(vector.left_path_length(), 3);
        assert_eq!(vector.get(1499), Ok(&1499));
    }

    #[rstest]
    fn test_four_level_tree_and_derived_version_round_trip() {
        let length = BRANCHING_FACTOR * BRANCHING_FACTOR * BRANCHING_FACTOR + 1;
        let deep: PersistentVector<usize> = (0..length).collect();
        let derived = deep.update(length / 2, 0).unwrap().pop().unwrap();

        let restored: PersistentVector<usize> =
            serde_json::from_str(&serde_json::to_string(&deep).unwrap()).unwrap();
        assert_eq!(restored.height(), 4);
        assert_eq!(restored, deep);

        let restored: PersistentVector<usize> =
            serde_json::from_str(&serde_json::to_string(&derived).unwrap()).unwrap();
        assert_eq!(restored.height(), 3);
        assert_eq!(restored.get(length / 2), Ok(&0));
        assert_eq!(restored, derived);
    }

    #[rstest]
    fn test_deserialize_strings() {
        let json = r#"["hello","world"]"#;
        let vector: PersistentVector<String> = serde_json::from_str(json).unwrap();
        assert_eq!(vector.len(), 2);
        assert_eq!(vector.get(1), Ok(&"world".to_string()));
    }

    #[rstest]
    fn test_deserialize_rejects_non_sequence() {
        let result: Result<PersistentVector<i32>, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }
}
