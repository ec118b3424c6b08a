//! Physical and Virtual Address Types
//!
//! Type-safe wrappers for the addresses exchanged with the host: the
//! physical location of a backing store and the virtual range a caller
//! wants it exposed at. Keeping them distinct prevents handing a virtual
//! address to the mapping primitive as if it were a frame.

use core::fmt;

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;
/// Page size mask
pub const PAGE_MASK: usize = PAGE_SIZE - 1;
/// Bits to shift for page number
pub const PAGE_SHIFT: usize = 12;

/// Round `len` up to a whole number of pages.
///
/// Returns `None` on overflow.
#[inline]
pub const fn page_round_up(len: usize) -> Option<usize> {
    match len.checked_add(PAGE_MASK) {
        Some(v) => Some(v & !PAGE_MASK),
        None => None,
    }
}

/// A physical memory address.
///
/// Physical addresses cannot be dereferenced; they are only handed to the
/// host mapping primitive.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(usize);

impl PhysAddr {
    /// Create a new physical address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if the address is page-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    /// The address `offset` bytes into the same backing store.
    #[inline]
    pub const fn add(self, offset: usize) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#018x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A virtual memory address in some caller's address space.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Create a new virtual address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if the address is page-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#018x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A half-open, page-aligned, non-empty virtual range `[start, end)`.
///
/// This is the shape of every mapping request: the length of the range is
/// the length of the backing store the caller asks for.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtRange {
    start: VirtAddr,
    end: VirtAddr,
}

impl VirtRange {
    /// Create a range from its bounds.
    ///
    /// Returns `None` if either bound is misaligned or the range is empty.
    pub const fn new(start: VirtAddr, end: VirtAddr) -> Option<Self> {
        if !start.is_aligned() || !end.is_aligned() || end.as_usize() <= start.as_usize() {
            return None;
        }
        Some(Self { start, end })
    }

    /// Create a range from a start address and a length in bytes.
    ///
    /// Returns `None` on misalignment, a zero length or overflow.
    pub const fn with_len(start: VirtAddr, len: usize) -> Option<Self> {
        match start.as_usize().checked_add(len) {
            Some(end) => Self::new(start, VirtAddr::new(end)),
            None => None,
        }
    }

    #[inline]
    pub const fn start(&self) -> VirtAddr {
        self.start
    }

    #[inline]
    pub const fn end(&self) -> VirtAddr {
        self.end
    }

    /// Length of the range in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.end.as_usize() - self.start.as_usize()
    }

    /// Number of pages covered.
    #[inline]
    pub const fn pages(&self) -> usize {
        self.len() >> PAGE_SHIFT
    }

    /// Check whether `addr` falls inside the range.
    #[inline]
    pub const fn contains(&self, addr: VirtAddr) -> bool {
        addr.as_usize() >= self.start.as_usize() && addr.as_usize() < self.end.as_usize()
    }

    /// Check whether two ranges share at least one page.
    #[inline]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start.as_usize() < other.end.as_usize() && other.start.as_usize() < self.end.as_usize()
    }
}

impl fmt::Debug for VirtRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtRange({}..{})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_alignment() {
        let frame = PhysAddr::new(0x4008_1000);
        assert!(frame.is_aligned());
        assert!(!frame.add(0x234).is_aligned());
        assert_eq!(frame.add(0x234).as_usize(), 0x4008_1234);
        assert!(VirtAddr::new(0x10_0000).is_aligned());
        assert!(!VirtAddr::new(0x10_0008).is_aligned());
    }

    #[test]
    fn test_page_round_up() {
        assert_eq!(page_round_up(0), Some(0));
        assert_eq!(page_round_up(1), Some(PAGE_SIZE));
        assert_eq!(page_round_up(PAGE_SIZE), Some(PAGE_SIZE));
        assert_eq!(page_round_up(usize::MAX), None);
    }

    #[test]
    fn test_range_rejects_bad_bounds() {
        let start = VirtAddr::new(0x1000_0000);
        assert!(VirtRange::new(start, start).is_none());
        assert!(VirtRange::new(start, VirtAddr::new(0x1000_0800)).is_none());
        assert!(VirtRange::new(VirtAddr::new(0x2000), VirtAddr::new(0x1000)).is_none());
        assert!(VirtRange::with_len(VirtAddr::new(usize::MAX & !PAGE_MASK), PAGE_SIZE).is_none());
    }

    #[test]
    fn test_range_geometry() {
        let a = VirtRange::with_len(VirtAddr::new(0x10_0000), 4 * PAGE_SIZE).unwrap();
        assert_eq!(a.len(), 4 * PAGE_SIZE);
        assert_eq!(a.pages(), 4);
        assert!(a.contains(VirtAddr::new(0x10_3fff)));
        assert!(!a.contains(a.end()));

        let b = VirtRange::with_len(VirtAddr::new(0x10_3000), PAGE_SIZE).unwrap();
        let c = VirtRange::with_len(a.end(), PAGE_SIZE).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
