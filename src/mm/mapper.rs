//! Region Mapper
//!
//! The host primitive that exposes a physical backing store at a caller's
//! virtual range. The heap only ever calls [`RegionMapper::map`]; how the
//! host installs the translation is its own business.
//!
//! # Properties
//! - All mappings carry explicit protection flags
//! - Inputs are validated before any translation is installed
//! - A failed mapping leaves no partial state behind

use alloc::collections::BTreeMap;

use bitflags::bitflags;
use spin::Mutex;

use super::address::{PhysAddr, VirtAddr, VirtRange};

bitflags! {
    /// Access rights requested for a mapping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;

        /// The usual protection for a shared heap object.
        const SHARED_RW = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Error type for mapping operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    /// The virtual range is already mapped.
    AlreadyMapped,
    /// The virtual range is not mapped.
    NotMapped,
    /// The host ran out of memory for its translation structures.
    OutOfMemory,
    /// The address is not properly aligned.
    MisalignedAddress,
    /// The requested protection is not allowed.
    InvalidPermissions,
}

impl core::fmt::Display for MappingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyMapped => write!(f, "virtual range already mapped"),
            Self::NotMapped => write!(f, "virtual range not mapped"),
            Self::OutOfMemory => write!(f, "out of memory for translations"),
            Self::MisalignedAddress => write!(f, "address not properly aligned"),
            Self::InvalidPermissions => write!(f, "invalid permission combination"),
        }
    }
}

/// Host mapping primitive.
pub trait RegionMapper: Send + Sync {
    /// Expose `phys` at `range` with the given protection.
    fn map(&self, range: VirtRange, phys: PhysAddr, prot: Protection) -> Result<(), MappingError>;

    /// Remove a mapping previously installed by [`RegionMapper::map`].
    fn unmap(&self, range: VirtRange) -> Result<(), MappingError>;
}

/// One installed translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingEntry {
    pub range: VirtRange,
    pub phys: PhysAddr,
    pub prot: Protection,
}

/// A software mapper that records translations in a table.
///
/// Keyed by range start; overlapping ranges are rejected. Executable
/// shared mappings are refused.
#[derive(Debug, Default)]
pub struct MappingTable {
    entries: Mutex<BTreeMap<VirtAddr, MappingEntry>>,
}

impl MappingTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Resolve a virtual address to its physical address.
    pub fn translate(&self, virt: VirtAddr) -> Option<PhysAddr> {
        let entries = self.entries.lock();
        let (_, entry) = entries.range(..=virt).next_back()?;
        if !entry.range.contains(virt) {
            return None;
        }
        Some(entry.phys.add(virt.as_usize() - entry.range.start().as_usize()))
    }

    /// Look up the mapping that starts at `start`.
    pub fn entry(&self, start: VirtAddr) -> Option<MappingEntry> {
        self.entries.lock().get(&start).copied()
    }

    /// Number of installed mappings.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegionMapper for MappingTable {
    fn map(&self, range: VirtRange, phys: PhysAddr, prot: Protection) -> Result<(), MappingError> {
        if !phys.is_aligned() {
            return Err(MappingError::MisalignedAddress);
        }
        if prot.contains(Protection::EXEC | Protection::WRITE) {
            return Err(MappingError::InvalidPermissions);
        }

        let mut entries = self.entries.lock();

        // The only candidates for overlap are the nearest entry below the
        // end of the new range.
        if let Some((_, prev)) = entries.range(..range.end()).next_back() {
            if prev.range.overlaps(&range) {
                return Err(MappingError::AlreadyMapped);
            }
        }

        entries.insert(range.start(), MappingEntry { range, phys, prot });
        Ok(())
    }

    fn unmap(&self, range: VirtRange) -> Result<(), MappingError> {
        let mut entries = self.entries.lock();
        match entries.get(&range.start()) {
            Some(entry) if entry.range == range => {
                entries.remove(&range.start());
                Ok(())
            }
            _ => Err(MappingError::NotMapped),
        }
    }
}
