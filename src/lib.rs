//! shmheap - Shared Page-Backed Heap
//!
//! A registry of named memory objects that independent callers map into
//! their own address space, size-query, lock/unlock for coordination and
//! release.
//!
//! # Layout
//! - [`mm`]: address types, backing-frame sources, the mapping primitive
//! - [`heap`]: object records, the registry and the lifecycle manager
//! - [`request`]: command numbers and errno-style dispatch for a host boundary
//! - [`security`]: scrubbing of released backing stores
//!
//! # Concurrency Contract
//! The per-object lock is a client protocol. `acquire_region`, `query_size`
//! and `release_region` never take it; callers needing atomicity across
//! several operations bracket them with `lock`/`unlock`.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod heap;
pub mod mm;
pub mod request;
pub mod security;

pub use heap::{HeapError, MappedRegion, ObjectId, SharedHeap};
pub use mm::{
    FrameSource, GlobalFrames, MappingError, MappingTable, PhysAddr, Protection, RegionMapper,
    RegionPool, VirtAddr, VirtRange, PAGE_SIZE,
};
