//! Persistent (immutable) data structures.
//!
//! This module provides [`PersistentVector`], a 32-way radix trie in which
//! every operation returns a new version:
//!
//! - `update` copies the nodes on one root-to-leaf path
//! - `append` copies (or creates) the nodes on the path to the new slot and
//!   grows the tree by one level when it is completely full
//! - `pop` copies the path to the last slot, dropping nodes that become
//!   empty, and shrinks the tree by one level when the last top-level
//!   branch disappears
//!
//! # Structural Sharing
//!
//! Nodes are never mutated once a vector refers to them, so any number of
//! versions can share subtrees:
//!
//! ```rust
//! use radixvec::persistent::PersistentVector;
//!
//! let vector: PersistentVector<i32> = (0..100).collect();
//! assert_eq!(vector.get(50), Ok(&50));
//!
//! let updated = vector.update(50, 999)?;
//! assert_eq!(vector.get(50), Ok(&50));     // Original unchanged
//! assert_eq!(updated.get(50), Ok(&999));   // New version
//! # Ok::<(), radixvec::error::VectorError>(())
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod vector;

pub use vector::BITS_PER_LEVEL;
pub use vector::BRANCHING_FACTOR;
pub use vector::PersistentVector;
pub use vector::PersistentVectorIntoIterator;
pub use vector::PersistentVectorIterator;
pub use vector::tree_height;
