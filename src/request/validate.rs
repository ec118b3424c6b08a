//! Request Input Validation
//!
//! Decodes and checks everything that crosses the boundary before the
//! heap sees it.
//!
//! # Principles
//! - Validate ALL inputs before use
//! - Fail closed: a malformed block is rejected, never guessed at
//! - Arguments are copied out of the caller's block, so later changes to
//!   it cannot affect a request in flight

use super::handler::Errno;
use crate::heap::ObjectId;
use crate::mm::{VirtAddr, VirtRange};

/// Size of an encoded [`HeapCommand`] in bytes.
pub const COMMAND_SIZE: usize = 16;

/// Argument block of a control command.
///
/// Layout: `offset: u64` then `size: u64`, little endian. `size` is
/// carried for callers that record the length they intend to map; the
/// control commands themselves only look at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapCommand {
    pub offset: u64,
    pub size: u64,
}

impl HeapCommand {
    /// The object this command names.
    #[inline]
    pub fn object_id(&self) -> ObjectId {
        ObjectId::from_offset(self.offset)
    }

    /// Encode into the wire layout.
    pub fn encode(&self) -> [u8; COMMAND_SIZE] {
        let mut out = [0u8; COMMAND_SIZE];
        out[..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..].copy_from_slice(&self.size.to_le_bytes());
        out
    }
}

/// Decode a control command's argument block
///
/// # Returns
/// * `Ok(HeapCommand)` - Decoded copy of the arguments
/// * `Err(Errno::Einval)` - The block is shorter than [`COMMAND_SIZE`]
///
/// Trailing bytes beyond the fixed layout are ignored.
pub fn decode_command(bytes: &[u8]) -> Result<HeapCommand, Errno> {
    let block = bytes.get(..COMMAND_SIZE).ok_or(Errno::Einval)?;
    let (offset, size) = block.split_at(8);
    let offset = u64::from_le_bytes(offset.try_into().map_err(|_| Errno::Einval)?);
    let size = u64::from_le_bytes(size.try_into().map_err(|_| Errno::Einval)?);
    Ok(HeapCommand { offset, size })
}

/// Validate the virtual range of a mapping request
///
/// # Checks
/// 1. Both bounds are page aligned
/// 2. The range is non-empty and `end > start`
pub fn validate_map_range(start: usize, end: usize) -> Result<VirtRange, Errno> {
    VirtRange::new(VirtAddr::new(start), VirtAddr::new(end)).ok_or(Errno::Einval)
}
