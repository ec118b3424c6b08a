//! Request Handler
//!
//! Dispatches control commands and mapping requests to the heap.
//!
//! # Considerations
//! - Unknown command numbers return ENOTTY
//! - Arguments are validated before use
//! - Heap errors are translated to errno values at this boundary only

use super::validate;
use crate::heap::{HeapError, ObjectId, SharedHeap};
use crate::mm::{Protection, RegionMapper};

/// Control command numbers
pub mod numbers {
    pub const HEAP_LOCK: u32 = 0x4e01;
    pub const HEAP_UNLOCK: u32 = 0x4e02;
    pub const HEAP_GETSIZE: u32 = 0x4e03;
    pub const HEAP_DELETE: u32 = 0x4e04;
}

/// Error codes returned across the boundary
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    /// Operation not permitted
    Eperm = -1,
    /// No such object
    Enoent = -2,
    /// Try again
    Eagain = -11,
    /// Out of memory
    Enomem = -12,
    /// Invalid argument
    Einval = -22,
    /// Unknown control command
    Enotty = -25,
}

impl From<HeapError> for Errno {
    fn from(err: HeapError) -> Self {
        match err {
            HeapError::NotFound => Errno::Enoent,
            HeapError::OutOfMemory => Errno::Enomem,
            HeapError::InvalidArgument => Errno::Einval,
            HeapError::PermissionDenied => Errno::Eperm,
            HeapError::TryAgain => Errno::Eagain,
        }
    }
}

fn status(result: Result<(), HeapError>) -> i64 {
    match result {
        Ok(()) => 0,
        Err(err) => Errno::from(err) as i64,
    }
}

/// Dispatch a control command
///
/// # Arguments
/// * `heap` - The heap the command operates on
/// * `cmd` - Command number (see [`numbers`])
/// * `args` - Raw argument block as copied in from the caller
///
/// # Returns
/// 0 (or the size, for `HEAP_GETSIZE`) on success, negative errno on failure
pub fn dispatch<M: RegionMapper>(heap: &SharedHeap<M>, cmd: u32, args: &[u8]) -> i64 {
    let command = match cmd {
        numbers::HEAP_LOCK | numbers::HEAP_UNLOCK | numbers::HEAP_GETSIZE | numbers::HEAP_DELETE => {
            match validate::decode_command(args) {
                Ok(command) => command,
                Err(e) => {
                    log::debug!("request {:#x}: bad argument block: {:?}", cmd, e);
                    return e as i64;
                }
            }
        }
        _ => {
            log::debug!("request: unknown command {:#x}", cmd);
            return Errno::Enotty as i64;
        }
    };

    let id = command.object_id();
    match cmd {
        numbers::HEAP_LOCK => status(heap.lock(id)),
        numbers::HEAP_UNLOCK => status(heap.unlock(id)),
        numbers::HEAP_GETSIZE => heap_getsize(heap, id),
        _ => heap_delete(heap, id),
    }
}

fn heap_getsize<M: RegionMapper>(heap: &SharedHeap<M>, id: ObjectId) -> i64 {
    match heap.query_size(id) {
        Ok(size) => i64::try_from(size).unwrap_or(Errno::Einval as i64),
        Err(err) => Errno::from(err) as i64,
    }
}

/// Delete rejects unknown and empty objects alike.
fn heap_delete<M: RegionMapper>(heap: &SharedHeap<M>, id: ObjectId) -> i64 {
    match heap.release_region(id) {
        Ok(()) => 0,
        Err(HeapError::NotFound | HeapError::PermissionDenied) => Errno::Eperm as i64,
        Err(err) => Errno::from(err) as i64,
    }
}

/// Mapping request
///
/// Exposes the object named by `offset` at `[start, end)`.
///
/// # Returns
/// 0 on success, negative errno on failure
///
/// # Validation
/// - The range must be page aligned and non-empty
pub fn map<M: RegionMapper>(
    heap: &SharedHeap<M>,
    offset: u64,
    start: usize,
    end: usize,
    prot: Protection,
) -> i64 {
    let range = match validate::validate_map_range(start, end) {
        Ok(range) => range,
        Err(e) => {
            log::debug!("map: invalid range {:#x}..{:#x}", start, end);
            return e as i64;
        }
    };

    match heap.acquire_region(ObjectId::from_offset(offset), range, prot) {
        Ok(_) => 0,
        Err(err) => Errno::from(err) as i64,
    }
}
