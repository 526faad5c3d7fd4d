//! Error types for persistent vector operations.
//!
//! Every error is detected before any node is read for modification or
//! allocated, so a failed call leaves the receiving vector, and every other
//! version sharing its nodes, exactly as it was.

use std::error::Error;
use std::fmt;

/// Represents an index outside `[0, length)`.
///
/// Returned by `get` and `update` when the requested index does not name a
/// live element.
///
/// # Examples
///
/// ```rust
/// use radixvec::error::IndexOutOfRangeError;
///
/// let error = IndexOutOfRangeError { index: 7, length: 3 };
/// assert_eq!(format!("{error}"), "index 7 is not inside [0, 3)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexOutOfRangeError {
    /// The index that was requested.
    pub index: usize,
    /// The length of the vector at the time of the call.
    pub length: usize,
}

impl fmt::Display for IndexOutOfRangeError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "index {} is not inside [0, {})",
            self.index, self.length
        )
    }
}

impl Error for IndexOutOfRangeError {}

/// Represents an operation that cannot be applied to the vector in its
/// current state, such as popping from an empty vector.
///
/// # Examples
///
/// ```rust
/// use radixvec::error::InvalidOperationError;
///
/// let error = InvalidOperationError {
///     operation: "pop",
///     reason: "vector is empty",
/// };
/// assert_eq!(format!("{error}"), "pop: vector is empty");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvalidOperationError {
    /// The name of the rejected operation.
    pub operation: &'static str,
    /// Why the operation was rejected.
    pub reason: &'static str,
}

impl fmt::Display for InvalidOperationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.operation, self.reason)
    }
}

impl Error for InvalidOperationError {}

/// Represents errors that can occur when working with a persistent vector.
///
/// Both kinds are deterministic: retrying the same call against the same
/// version reproduces the same error.
///
/// # Examples
///
/// ```rust
/// use radixvec::error::{IndexOutOfRangeError, VectorError};
///
/// let error = VectorError::from(IndexOutOfRangeError { index: 5, length: 5 });
/// assert!(matches!(error, VectorError::IndexOutOfRange(_)));
/// assert_eq!(error.to_string(), "index 5 is not inside [0, 5)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorError {
    /// The index is not inside `[0, length)`.
    IndexOutOfRange(IndexOutOfRangeError),
    /// The operation is not valid for the vector's current state.
    InvalidOperation(InvalidOperationError),
}

impl VectorError {
    pub(crate) const fn index_out_of_range(index: usize, length: usize) -> Self {
        Self::IndexOutOfRange(IndexOutOfRangeError { index, length })
    }

    pub(crate) const fn empty_vector(operation: &'static str) -> Self {
        Self::InvalidOperation(InvalidOperationError {
            operation,
            reason: "vector is empty",
        })
    }
}

impl fmt::Display for VectorError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange(error) => write!(formatter, "{error}"),
            Self::InvalidOperation(error) => write!(formatter, "{error}"),
        }
    }
}

impl Error for VectorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IndexOutOfRange(error) => Some(error),
            Self::InvalidOperation(error) => Some(error),
        }
    }
}

impl From<IndexOutOfRangeError> for VectorError {
    fn from(error: IndexOutOfRangeError) -> Self {
        Self::IndexOutOfRange(error)
    }
}

impl From<InvalidOperationError> for VectorError {
    fn from(error: InvalidOperationError) -> Self {
        Self::InvalidOperation(error)
    }
}
