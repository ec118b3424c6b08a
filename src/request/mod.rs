//! Request Interface
//!
//! The marshalling boundary a host device or service exposes the heap
//! through: numbered control commands carrying a raw argument block, plus
//! a separate mapping entry.
//!
//! # Model
//! - Whitelist: only the commands in [`numbers`] are accepted
//! - Arguments are decoded and validated before the heap sees them
//! - Results are non-negative on success, a negative [`Errno`] otherwise
//!
//! # Commands
//! - `HEAP_LOCK(offset)`: create if needed, then block on the object lock
//! - `HEAP_UNLOCK(offset)`: release the object lock
//! - `HEAP_GETSIZE(offset)`: current backing size
//! - `HEAP_DELETE(offset)`: free the backing store

mod handler;
mod validate;

pub use handler::{dispatch, map, numbers, Errno};
pub use validate::{decode_command, validate_map_range, HeapCommand, COMMAND_SIZE};
