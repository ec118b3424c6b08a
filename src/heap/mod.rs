//! Shared Heap Core
//!
//! A registry of named memory objects plus the lifecycle rules around
//! them:
//! - Objects are created by `lock` and never destroyed
//! - Backing stores are allocated lazily by the first mapping request and
//!   freed by `release_region`
//! - Every later mapping must ask for the established size exactly

mod error;
mod manager;
mod object;
mod registry;

pub use error::HeapError;
pub use manager::{MappedRegion, SharedHeap};
pub use object::{ObjectId, ObjectLock, ObjectRecord};
pub use registry::Registry;
