//! Object Registry
//!
//! An insertion-ordered table of object records behind one coarse lock.
//!
//! # Design
//! - Lookup is a linear scan in creation order
//! - The lock is held only for lookup/creation, never while a record's
//!   backing store is touched or its client lock is awaited
//! - Records are never removed, so the table grows monotonically for the
//!   life of the heap

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use super::error::HeapError;
use super::object::{ObjectId, ObjectRecord};

#[derive(Debug, Default)]
pub struct Registry {
    objects: Mutex<Vec<Arc<ObjectRecord>>>,
}

impl Registry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
        }
    }

    /// Look up a record. Absence is an ordinary outcome.
    pub fn find(&self, id: ObjectId) -> Option<Arc<ObjectRecord>> {
        let objects = self.objects.lock();
        Self::scan(&objects, id)
    }

    /// Return the record for `id`, appending a fresh one if needed.
    ///
    /// Lookup and insertion happen under one critical section, so two
    /// concurrent callers never create duplicate records.
    pub fn find_or_create(&self, id: ObjectId) -> Result<Arc<ObjectRecord>, HeapError> {
        let mut objects = self.objects.lock();
        if let Some(record) = Self::scan(&objects, id) {
            return Ok(record);
        }

        objects
            .try_reserve(1)
            .map_err(|_| HeapError::OutOfMemory)?;
        let record = Arc::new(ObjectRecord::new(id));
        objects.push(Arc::clone(&record));

        log::debug!("registry: created object {} ({} total)", id, objects.len());
        Ok(record)
    }

    /// Number of records ever created.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers in creation order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.lock().iter().map(|r| r.id()).collect()
    }

    fn scan(objects: &[Arc<ObjectRecord>], id: ObjectId) -> Option<Arc<ObjectRecord>> {
        objects.iter().find(|r| r.id() == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_absent() {
        let registry = Registry::new();
        assert!(registry.find(ObjectId::new(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_or_create_is_idempotent() {
        let registry = Registry::new();
        let a = registry.find_or_create(ObjectId::new(7)).unwrap();
        let b = registry.find_or_create(ObjectId::new(7)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        let found = registry.find(ObjectId::new(7)).unwrap();
        assert!(Arc::ptr_eq(&a, &found));
    }

    #[test]
    fn test_insertion_order() {
        let registry = Registry::new();
        for id in [5u64, 1, 3, 1, 5, 9] {
            registry.find_or_create(ObjectId::new(id)).unwrap();
        }
        let ids: Vec<u64> = registry.ids().into_iter().map(ObjectId::as_u64).collect();
        assert_eq!(ids, [5, 1, 3, 9]);
    }

    #[test]
    fn test_growth_is_monotonic() {
        let registry = Registry::new();
        for n in 0..512u64 {
            registry.find_or_create(ObjectId::new(n)).unwrap();
            assert_eq!(registry.len(), n as usize + 1);
        }
        // Looking everything up again never shrinks or grows the table.
        for n in 0..512u64 {
            assert!(registry.find(ObjectId::new(n)).is_some());
        }
        assert_eq!(registry.len(), 512);
    }

    #[test]
    fn test_concurrent_creation_has_no_duplicates() {
        use std::thread;

        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for n in 0..64u64 {
                        registry.find_or_create(ObjectId::new(n)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 64);
    }
}
