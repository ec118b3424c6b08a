//! Heap Objects
//!
//! One [`ObjectRecord`] exists per identifier ever locked or created. It
//! pairs the object's backing store with the client-visible
//! [`ObjectLock`].
//!
//! # Invariants
//! - `size() > 0` exactly when a backing store is present; the size is
//!   read from the store itself, so the two cannot disagree
//! - Every range the store is mapped at is recorded next to it and torn
//!   down with it
//! - The record is never destroyed; only its backing store comes and goes

use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::mutex::TicketMutex;
use spin::{Mutex, MutexGuard};

use crate::mm::{BackingStore, VirtRange, PAGE_SHIFT};

/// Identifier of a heap object.
///
/// Callers name objects by a page-aligned byte offset; the identifier is
/// that offset in pages.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Derive the identifier from a byte offset (truncating to its page).
    #[inline]
    pub const fn from_offset(offset: u64) -> Self {
        Self(offset >> PAGE_SHIFT)
    }

    /// The page-aligned byte offset naming this object.
    #[inline]
    pub const fn offset(self) -> u64 {
        self.0 << PAGE_SHIFT
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-object exclusive lock exposed to clients.
///
/// Unlike a guard-based mutex, acquisition and release are separate calls
/// that may come from different requests. Waiters are served in arrival
/// order. Holder identity is not tracked: whoever calls `release` releases
/// it.
///
/// `held` is set by the acquirer and claimed by exactly one releaser, so
/// the ticket queue advances once per acquisition no matter how many
/// releases race.
pub struct ObjectLock {
    inner: TicketMutex<()>,
    held: AtomicBool,
}

impl ObjectLock {
    pub const fn new() -> Self {
        Self {
            inner: TicketMutex::new(()),
            held: AtomicBool::new(false),
        }
    }

    /// Block until the lock is acquired.
    pub fn acquire(&self) {
        core::mem::forget(self.inner.lock());
        self.held.store(true, Ordering::Release);
    }

    /// Acquire the lock if it is free.
    pub fn try_acquire(&self) -> bool {
        match self.inner.try_lock() {
            Some(guard) => {
                core::mem::forget(guard);
                self.held.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Whether some caller currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Release the lock, waking the next waiter.
    ///
    /// Returns `false` if the lock was not held; the queue is left alone.
    pub fn release(&self) -> bool {
        if self
            .held
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // SAFETY: the successful exchange above makes this the only release
        // of the current acquisition.
        unsafe { self.inner.force_unlock() };
        true
    }
}

impl Default for ObjectLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_held() {
            write!(f, "ObjectLock(held)")
        } else {
            write!(f, "ObjectLock(free)")
        }
    }
}

/// A backing store and the virtual ranges it is currently mapped at.
pub(crate) struct Backing {
    pub(crate) store: BackingStore,
    pub(crate) mappings: Vec<VirtRange>,
}

impl Backing {
    pub(crate) fn new(store: BackingStore) -> Self {
        Self {
            store,
            mappings: Vec::new(),
        }
    }
}

/// A registry entry: identity, client lock and backing store.
pub struct ObjectRecord {
    id: ObjectId,
    lock: ObjectLock,
    backing: Mutex<Option<Backing>>,
}

impl ObjectRecord {
    /// A fresh record: no backing store, lock free.
    pub(crate) const fn new(id: ObjectId) -> Self {
        Self {
            id,
            lock: ObjectLock::new(),
            backing: Mutex::new(None),
        }
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Current backing size in bytes, 0 when unallocated.
    pub fn size(&self) -> usize {
        self.backing.lock().as_ref().map_or(0, |b| b.store.len())
    }

    /// The client-visible exclusive lock.
    #[inline]
    pub fn lock(&self) -> &ObjectLock {
        &self.lock
    }

    /// Short internal guard over the backing store slot.
    ///
    /// This is not the client lock; it only keeps the size/data pair
    /// consistent within a single operation.
    pub(crate) fn backing(&self) -> MutexGuard<'_, Option<Backing>> {
        self.backing.lock()
    }
}

impl fmt::Debug for ObjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRecord")
            .field("id", &self.id)
            .field("size", &self.size())
            .field("lock", &self.lock)
            .finish()
    }
}
