//! Heap error taxonomy.

/// Error type for shared heap operations.
///
/// Every error is returned to the immediate caller; nothing is retried
/// internally. Partial state is rolled back before an error surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// The object identifier has never been created.
    NotFound,
    /// A backing store or an object record could not be allocated.
    OutOfMemory,
    /// The requested length does not match the established size, or the
    /// request itself is malformed.
    InvalidArgument,
    /// The operation needs a backing store the object does not have.
    PermissionDenied,
    /// The host could not map the backing store; state was rolled back.
    TryAgain,
}

impl core::fmt::Display for HeapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "object not found"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::PermissionDenied => write!(f, "object has no backing store"),
            Self::TryAgain => write!(f, "mapping failed, try again"),
        }
    }
}
