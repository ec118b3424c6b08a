//! Object Lifecycle and Access Manager
//!
//! Implements the client-visible operations on top of the registry.
//!
//! # Lifecycle
//! ```text
//!            acquire_region (alloc + map ok)
//!   Empty ───────────────────────────────────▶ Backed
//!     ▲                                          │
//!     └────────────── release_region ────────────┘
//! ```
//! A size mismatch leaves a `Backed` object untouched. A host mapping
//! failure rolls the object back to `Empty`, whether its store was fresh
//! or already established.
//!
//! The heap records every range it installs. Rollback and release unmap
//! them all before the store is freed, so no translation outlives its
//! frames.
//!
//! The per-object lock moves between free and held only through
//! `lock`/`unlock`, independent of the backing state.

use alloc::sync::Arc;
use core::fmt;
use core::ptr::NonNull;

use super::error::HeapError;
use super::object::{Backing, ObjectId};
use super::registry::Registry;
use crate::mm::{BackingStore, FrameSource, PhysAddr, Protection, RegionMapper, VirtRange};

/// A backing store exposed at a caller's virtual range.
///
/// The region stays valid until the object is released or rolled back.
/// The bytes are shared with every other mapping of the same object.
pub struct MappedRegion {
    id: ObjectId,
    range: VirtRange,
    phys: PhysAddr,
    ptr: NonNull<u8>,
}

impl MappedRegion {
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn range(&self) -> VirtRange {
        self.range
    }

    /// Physical location of the backing store.
    #[inline]
    pub fn phys(&self) -> PhysAddr {
        self.phys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Host-side pointer to the shared bytes.
    ///
    /// Dereferencing is only valid until `release_region` on this object,
    /// and concurrent writers must coordinate through the object lock.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MappedRegion(id={}, {:?} -> {})", self.id, self.range, self.phys)
    }
}

/// The shared heap: registry, backing source and mapping primitive.
///
/// Created once by the hosting service and passed by reference to every
/// request.
pub struct SharedHeap<M: RegionMapper> {
    registry: Registry,
    frames: Arc<dyn FrameSource>,
    mapper: M,
}

impl<M: RegionMapper> SharedHeap<M> {
    pub fn new(frames: Arc<dyn FrameSource>, mapper: M) -> Self {
        log::info!("shared heap: ready");
        Self {
            registry: Registry::new(),
            frames,
            mapper,
        }
    }

    /// The mapping primitive this heap installs regions with.
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Number of object identities ever created.
    pub fn object_count(&self) -> usize {
        self.registry.len()
    }

    /// Expose object `id` at `range`, allocating its backing store on the
    /// first request.
    ///
    /// The object must already exist (see [`SharedHeap::lock`]). Once
    /// backed, every later request must ask for exactly the same length.
    /// If the host refuses the mapping, the object's store and all of its
    /// mappings are torn down and `TryAgain` is returned.
    /// Does not take the object lock.
    pub fn acquire_region(
        &self,
        id: ObjectId,
        range: VirtRange,
        prot: Protection,
    ) -> Result<MappedRegion, HeapError> {
        let record = self.registry.find(id).ok_or(HeapError::NotFound)?;
        let len = range.len();

        let mut slot = record.backing();
        let mut backing = match slot.take() {
            Some(backing) if backing.store.len() != len => {
                log::debug!(
                    "object {}: size mismatch (have {:#x}, asked {:#x})",
                    id,
                    backing.store.len(),
                    len
                );
                *slot = Some(backing);
                return Err(HeapError::InvalidArgument);
            }
            Some(backing) => backing,
            None => {
                let store =
                    BackingStore::alloc(&self.frames, len).ok_or(HeapError::OutOfMemory)?;
                log::debug!("object {}: allocated {:?}", id, store);
                Backing::new(store)
            }
        };

        let phys = backing.store.phys_addr();
        if let Err(err) = self.mapper.map(range, phys, prot) {
            log::warn!("object {}: map of {:?} failed ({}), rolling back", id, range, err);
            self.teardown(id, backing);
            return Err(HeapError::TryAgain);
        }

        log::debug!("object {}: mapped {} pages at {:?}", id, range.pages(), range);
        backing.mappings.push(range);
        let region = MappedRegion {
            id,
            range,
            phys,
            ptr: backing.store.as_ptr(),
        };
        *slot = Some(backing);
        Ok(region)
    }

    /// Current size of object `id`, 0 when it has no backing store.
    pub fn query_size(&self, id: ObjectId) -> Result<usize, HeapError> {
        let record = self.registry.find(id).ok_or(HeapError::NotFound)?;
        Ok(record.size())
    }

    /// Acquire object `id`'s lock, creating the object if it is new.
    ///
    /// Blocks until the lock is free. There is no timeout.
    pub fn lock(&self, id: ObjectId) -> Result<(), HeapError> {
        let record = self.registry.find_or_create(id)?;
        record.lock().acquire();
        log::debug!("object {}: locked", id);
        Ok(())
    }

    /// Acquire object `id`'s lock without waiting.
    ///
    /// Creates the object like [`SharedHeap::lock`]; returns whether the
    /// lock was taken.
    pub fn try_lock(&self, id: ObjectId) -> Result<bool, HeapError> {
        let record = self.registry.find_or_create(id)?;
        Ok(record.lock().try_acquire())
    }

    /// Release object `id`'s lock.
    ///
    /// Holder identity is not tracked. Unlocking a free lock is a caller
    /// error; it is logged and otherwise ignored.
    pub fn unlock(&self, id: ObjectId) -> Result<(), HeapError> {
        let record = self.registry.find(id).ok_or(HeapError::NotFound)?;
        if record.lock().release() {
            log::debug!("object {}: unlocked", id);
        } else {
            log::warn!("object {}: unlock of a free lock ignored", id);
        }
        Ok(())
    }

    /// Free object `id`'s backing store and remove its mappings.
    ///
    /// The identity and its lock survive.
    pub fn release_region(&self, id: ObjectId) -> Result<(), HeapError> {
        let record = self.registry.find(id).ok_or(HeapError::NotFound)?;
        let mut slot = record.backing();
        let backing = slot.take().ok_or(HeapError::PermissionDenied)?;
        self.teardown(id, backing);
        Ok(())
    }

    /// Unmap every range `backing` is installed at, then free the store.
    ///
    /// Called with the record's slot already emptied and still locked.
    fn teardown(&self, id: ObjectId, backing: Backing) {
        for range in &backing.mappings {
            if let Err(err) = self.mapper.unmap(*range) {
                log::warn!("object {}: unmap of {:?} failed ({})", id, range, err);
            }
        }
        log::debug!(
            "object {}: released {:?} ({} mappings)",
            id,
            backing.store,
            backing.mappings.len()
        );
    }
}

impl<M: RegionMapper + fmt::Debug> fmt::Debug for SharedHeap<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHeap")
            .field("objects", &self.registry.len())
            .field("mapper", &self.mapper)
            .finish()
    }
}
