//! Bounded Region Pool
//!
//! Uses `linked_list_allocator` to carve backing stores out of a single
//! fixed arena, the way a kernel hands out memory from a reserved region.
//!
//! # Memory Layout
//! - The arena is one page-aligned allocation made at construction
//! - Every region is rounded up to whole pages
//! - Exhaustion is reported as `None`, which the heap surfaces as
//!   `OutOfMemory`

use alloc::alloc::{alloc, dealloc, Layout};
use core::fmt;
use core::ptr::NonNull;

use linked_list_allocator::LockedHeap;

use super::address::{page_round_up, PAGE_SIZE};
use super::frame::FrameSource;

/// A fixed-capacity frame source.
pub struct RegionPool {
    heap: LockedHeap,
    arena: NonNull<u8>,
    arena_layout: Layout,
}

// SAFETY: the arena is only touched through the locked heap.
unsafe impl Send for RegionPool {}
// SAFETY: all mutation goes through `LockedHeap`'s spinlock.
unsafe impl Sync for RegionPool {}

impl RegionPool {
    /// Create a pool managing `capacity` bytes (rounded up to pages).
    ///
    /// Returns `None` if the arena itself cannot be allocated.
    pub fn new(capacity: usize) -> Option<Self> {
        let capacity = page_round_up(capacity)?.max(PAGE_SIZE);
        let arena_layout = Layout::from_size_align(capacity, PAGE_SIZE).ok()?;
        // SAFETY: capacity is at least one page.
        let arena = NonNull::new(unsafe { alloc(arena_layout) })?;

        let heap = LockedHeap::empty();
        // SAFETY:
        // - the arena is a fresh allocation owned by this pool
        // - it outlives the heap (freed in Drop)
        // - nothing else accesses it directly
        unsafe {
            heap.lock().init(arena.as_ptr(), capacity);
        }

        log::debug!("region pool: {} KiB arena", capacity / 1024);

        Some(Self {
            heap,
            arena,
            arena_layout,
        })
    }

    /// Total bytes managed by the pool.
    pub fn capacity(&self) -> usize {
        self.heap.lock().size()
    }

    /// Bytes currently handed out.
    pub fn used(&self) -> usize {
        self.heap.lock().used()
    }

    /// Bytes still available.
    pub fn free(&self) -> usize {
        self.heap.lock().free()
    }

    fn layout(len: usize) -> Option<Layout> {
        Layout::from_size_align(page_round_up(len)?, PAGE_SIZE).ok()
    }
}

impl FrameSource for RegionPool {
    fn allocate(&self, len: usize) -> Option<NonNull<u8>> {
        if len == 0 {
            return None;
        }
        let layout = Self::layout(len)?;
        self.heap.lock().allocate_first_fit(layout).ok()
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, len: usize) {
        if let Some(layout) = Self::layout(len) {
            // SAFETY: caller guarantees ptr/len came from allocate.
            unsafe { self.heap.lock().deallocate(ptr, layout) };
        }
    }
}

impl fmt::Debug for RegionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = self.heap.lock();
        write!(f, "RegionPool(used={:#x}, size={:#x})", heap.used(), heap.size())
    }
}

impl Drop for RegionPool {
    fn drop(&mut self) {
        // SAFETY: every BackingStore holds an Arc to its source, so no
        // region can be outstanding once the pool itself is dropped.
        unsafe { dealloc(self.arena.as_ptr(), self.arena_layout) };
    }
}
