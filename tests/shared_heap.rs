//! Cross-thread tests for the shared heap.
//!
//! These drive the heap the way independent clients would: each thread
//! holds a reference to one heap and coordinates only through the object
//! locks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use shmheap::heap::HeapError;
use shmheap::request::{self, numbers, HeapCommand};
use shmheap::{
    GlobalFrames, MappingTable, ObjectId, Protection, RegionPool, SharedHeap, VirtAddr, VirtRange,
    PAGE_SIZE,
};

fn heap() -> Arc<SharedHeap<MappingTable>> {
    Arc::new(SharedHeap::new(Arc::new(GlobalFrames), MappingTable::new()))
}

fn range(start: usize, len: usize) -> VirtRange {
    VirtRange::with_len(VirtAddr::new(start), len).unwrap()
}

// ============================================================================
// Locking
// ============================================================================

/// A second locker blocks until the first one unlocks.
#[test]
fn test_second_lock_waits_for_unlock() {
    let heap = heap();
    let id = ObjectId::new(42);
    heap.lock(id).unwrap();

    let acquired = Arc::new(AtomicBool::new(false));
    let waiter = {
        let heap = Arc::clone(&heap);
        let acquired = Arc::clone(&acquired);
        thread::spawn(move || {
            heap.lock(id).unwrap();
            acquired.store(true, Ordering::SeqCst);
            heap.unlock(id).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!acquired.load(Ordering::SeqCst));

    heap.unlock(id).unwrap();
    waiter.join().unwrap();
    assert!(acquired.load(Ordering::SeqCst));
}

/// Increments bracketed by lock/unlock never lose an update.
#[test]
fn test_lock_serializes_shared_counter() {
    let heap = heap();
    let id = ObjectId::new(1);
    heap.lock(id).unwrap();
    let region = heap
        .acquire_region(id, range(0x10_0000, PAGE_SIZE), Protection::SHARED_RW)
        .unwrap();
    let counter = region.as_ptr() as usize;
    heap.unlock(id).unwrap();

    let threads = 4;
    let rounds = 500;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                for _ in 0..rounds {
                    heap.lock(id).unwrap();
                    // SAFETY: the object lock is held and the region is
                    // not released during the test.
                    unsafe {
                        let p = counter as *mut u64;
                        p.write_volatile(p.read_volatile() + 1);
                    }
                    heap.unlock(id).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total = unsafe { (counter as *const u64).read_volatile() };
    assert_eq!(total, (threads * rounds) as u64);
}

// ============================================================================
// Scenarios
// ============================================================================

/// Lock, map, unlock; another caller then locks and sees the size.
#[test]
fn test_lock_map_unlock_handoff() {
    let heap = heap();
    let id = ObjectId::new(42);

    heap.lock(id).unwrap();
    let region = heap
        .acquire_region(id, range(0x40_0000, 4096), Protection::SHARED_RW)
        .unwrap();
    assert_eq!(region.len(), 4096);
    assert_eq!(heap.query_size(id), Ok(4096));

    let (tx, rx) = mpsc::channel();
    let other = {
        let heap = Arc::clone(&heap);
        thread::spawn(move || {
            heap.lock(id).unwrap();
            tx.send(heap.query_size(id)).unwrap();
            heap.unlock(id).unwrap();
        })
    };

    heap.unlock(id).unwrap();
    assert_eq!(rx.recv().unwrap(), Ok(4096));
    other.join().unwrap();
    assert_eq!(heap.query_size(id), Ok(4096));
}

/// A pattern written through one mapping is visible through another.
#[test]
fn test_pattern_visible_through_second_mapping() {
    let heap = heap();
    let id = ObjectId::new(9);
    let len = 2 * PAGE_SIZE;
    heap.lock(id).unwrap();

    let first = heap
        .acquire_region(id, range(0x10_0000, len), Protection::SHARED_RW)
        .unwrap();
    let pattern: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    unsafe { std::ptr::copy_nonoverlapping(pattern.as_ptr(), first.as_ptr(), len) };

    let second = heap
        .acquire_region(id, range(0x80_0000, len), Protection::READ)
        .unwrap();
    let seen = unsafe { std::slice::from_raw_parts(second.as_ptr(), len) };
    assert_eq!(seen, &pattern[..]);
    assert_eq!(
        heap.mapper().translate(VirtAddr::new(0x80_0000 + 100)),
        Some(first.phys().add(100))
    );
    heap.unlock(id).unwrap();
}

/// Concurrent first mappings of one object allocate exactly once.
#[test]
fn test_racing_first_mappings_allocate_once() {
    let pool = Arc::new(RegionPool::new(16 * PAGE_SIZE).unwrap());
    let heap = Arc::new(SharedHeap::new(pool.clone(), MappingTable::new()));
    let id = ObjectId::new(5);
    heap.lock(id).unwrap();
    heap.unlock(id).unwrap();

    let successes = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let heap = Arc::clone(&heap);
            let successes = Arc::clone(&successes);
            thread::spawn(move || {
                let start = 0x100_0000 + t * 0x10_0000;
                let result = heap.acquire_region(id, range(start, PAGE_SIZE), Protection::SHARED_RW);
                if result.is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(successes.load(Ordering::SeqCst), 8);
    assert_eq!(pool.used(), PAGE_SIZE);
    assert_eq!(heap.query_size(id), Ok(PAGE_SIZE));
}

/// Released frames are scrubbed before the next owner gets them.
#[test]
fn test_recycled_backing_is_scrubbed() {
    let pool = Arc::new(RegionPool::new(PAGE_SIZE).unwrap());
    let heap = SharedHeap::new(pool.clone(), MappingTable::new());
    let a = ObjectId::new(1);
    let b = ObjectId::new(2);
    heap.lock(a).unwrap();
    heap.lock(b).unwrap();

    let region = heap
        .acquire_region(a, range(0x10_0000, PAGE_SIZE), Protection::SHARED_RW)
        .unwrap();
    unsafe { std::ptr::write_bytes(region.as_ptr(), 0xee, PAGE_SIZE) };

    // The single page is taken.
    assert_eq!(
        heap.acquire_region(b, range(0x20_0000, PAGE_SIZE), Protection::SHARED_RW)
            .unwrap_err(),
        HeapError::OutOfMemory
    );

    heap.release_region(a).unwrap();
    let reused = heap
        .acquire_region(b, range(0x20_0000, PAGE_SIZE), Protection::SHARED_RW)
        .unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(reused.as_ptr(), PAGE_SIZE) };
    assert!(bytes.iter().all(|&x| x == 0));

    heap.unlock(a).unwrap();
    heap.unlock(b).unwrap();
}

// ============================================================================
// Identity growth
// ============================================================================

/// Object identities accumulate and are never removed.
#[test]
fn test_identities_only_grow() {
    let heap = heap();
    let mut seen = 0;
    for n in 0..1000u64 {
        let id = ObjectId::new(n % 250);
        heap.lock(id).unwrap();
        heap.unlock(id).unwrap();
        seen = seen.max(n.min(249) as usize + 1);
        assert_eq!(heap.object_count(), seen);
    }
    assert_eq!(heap.object_count(), 250);
}

// ============================================================================
// Request boundary
// ============================================================================

/// Requests from several threads go through the errno boundary.
#[test]
fn test_request_boundary_across_threads() {
    let heap = heap();
    let offset = 7 * PAGE_SIZE as u64;
    let args = HeapCommand { offset, size: PAGE_SIZE as u64 }.encode();

    assert_eq!(request::dispatch(&heap, numbers::HEAP_LOCK, &args), 0);
    assert_eq!(
        request::map(&heap, offset, 0x10_0000, 0x10_1000, Protection::SHARED_RW),
        0
    );
    assert_eq!(request::dispatch(&heap, numbers::HEAP_UNLOCK, &args), 0);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                assert_eq!(request::dispatch(&heap, numbers::HEAP_LOCK, &args), 0);
                let size = request::dispatch(&heap, numbers::HEAP_GETSIZE, &args);
                assert_eq!(request::dispatch(&heap, numbers::HEAP_UNLOCK, &args), 0);
                size
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), PAGE_SIZE as i64);
    }
}
