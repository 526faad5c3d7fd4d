//! # radixvec
//!
//! A persistent (immutable) vector built on a 32-way radix trie.
//!
//! ## Overview
//!
//! Every operation that looks like a mutation returns a new version of the
//! vector and leaves the receiver untouched. New versions copy only the
//! nodes on the path from the root to the affected slot; every other
//! subtree is shared between versions.
//!
//! - **Persistent Vector**: [`persistent::PersistentVector`] with `get`,
//!   `update`, `append` and `pop`
//! - **Errors**: [`error::VectorError`] for out-of-range indices and
//!   operations that are invalid on an empty vector
//!
//! ## Feature Flags
//!
//! - `persistent`: The persistent vector (enabled by default)
//! - `arc`: Use `Arc` instead of `Rc` for nodes so versions can cross threads
//! - `serde`: Serialize and deserialize vectors as plain sequences
//! - `tracing`: Emit `tracing` events on tree height changes and rejected operations
//! - `full`: Enable `persistent`, `serde` and `tracing`
//!
//! ## Example
//!
//! ```rust
//! use radixvec::prelude::*;
//!
//! let vector = PersistentVector::new().append(1).append(2).append(3);
//! let updated = vector.update(1, 20)?;
//!
//! assert_eq!(vector.get(1), Ok(&2));
//! assert_eq!(updated.get(1), Ok(&20));
//! # Ok::<(), VectorError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use radixvec::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::*;

    #[cfg(feature = "persistent")]
    pub use crate::persistent::*;
}

pub mod error;

#[cfg(feature = "persistent")]
pub mod persistent;
