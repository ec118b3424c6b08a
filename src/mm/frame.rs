//! Backing Frame Sources
//!
//! The heap never allocates object memory itself. It asks a [`FrameSource`]
//! for a page-aligned, physically addressable buffer and wraps the result
//! in a [`BackingStore`], the only owner of those bytes.
//!
//! # Ownership
//! - A `BackingStore` is never cloned or aliased by the heap
//! - Dropping it scrubs the bytes and hands them back to the source
//! - Failure to allocate is reported as `None`, never a panic

use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use alloc::sync::Arc;
use core::fmt;
use core::ptr::NonNull;

use super::address::{PhysAddr, PAGE_SIZE};
use crate::security::Zeroize;

/// A provider of raw backing memory.
pub trait FrameSource: Send + Sync {
    /// Allocate `len` bytes, page aligned.
    ///
    /// Contents may be zeroed or garbage. Returns `None` on exhaustion.
    fn allocate(&self, len: usize) -> Option<NonNull<u8>>;

    /// Return a buffer obtained from [`FrameSource::allocate`].
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this source with the same `len`,
    /// and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, len: usize);

    /// Physical address of an allocated buffer.
    ///
    /// The default is the identity translation used by hosted deployments.
    fn phys_addr(&self, ptr: NonNull<u8>) -> PhysAddr {
        PhysAddr::new(ptr.as_ptr() as usize)
    }
}

/// A uniquely owned backing buffer of exactly `len` bytes.
///
/// This provides automatic cleanup even in rollback paths.
pub struct BackingStore {
    ptr: NonNull<u8>,
    len: usize,
    source: Arc<dyn FrameSource>,
}

// SAFETY: the buffer is exclusively owned by this handle and the source is
// itself Send + Sync.
unsafe impl Send for BackingStore {}
// SAFETY: shared access only exposes the address and length.
unsafe impl Sync for BackingStore {}

impl BackingStore {
    /// Allocate a new backing store of `len` bytes from `source`.
    ///
    /// Returns `None` if `len` is zero or the source is exhausted.
    pub fn alloc(source: &Arc<dyn FrameSource>, len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let ptr = source.allocate(len)?;
        Some(Self {
            ptr,
            len,
            source: Arc::clone(source),
        })
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Physical location handed to the mapping primitive.
    #[inline]
    pub fn phys_addr(&self) -> PhysAddr {
        self.source.phys_addr(self.ptr)
    }

    /// Kernel-side pointer to the first byte.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }
}

impl fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackingStore(phys={}, len={:#x})", self.phys_addr(), self.len)
    }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        // SAFETY: we own `len` bytes at `ptr` until deallocation below.
        let bytes = unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) };
        bytes.zeroize();
        // SAFETY: ptr/len came from this source's allocate.
        unsafe { self.source.deallocate(self.ptr, self.len) };
    }
}

/// Frame source backed by the global allocator.
///
/// Buffers are zeroed and page aligned. Suitable for hosted deployments
/// where the process heap is the physical memory pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalFrames;

impl GlobalFrames {
    fn layout(len: usize) -> Option<Layout> {
        Layout::from_size_align(len, PAGE_SIZE).ok()
    }
}

impl FrameSource for GlobalFrames {
    fn allocate(&self, len: usize) -> Option<NonNull<u8>> {
        if len == 0 {
            return None;
        }
        let layout = Self::layout(len)?;
        // SAFETY: layout has a non-zero size.
        NonNull::new(unsafe { alloc_zeroed(layout) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, len: usize) {
        if let Some(layout) = Self::layout(len) {
            // SAFETY: caller guarantees ptr was allocated with this layout.
            unsafe { dealloc(ptr.as_ptr(), layout) };
        }
    }
}
