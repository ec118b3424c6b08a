//! Memory management module
//!
//! Provides the two host primitives the heap consumes:
//! - Backing memory ([`FrameSource`], with [`GlobalFrames`] and [`RegionPool`])
//! - Exposing it at a caller's virtual range ([`RegionMapper`], with
//!   [`MappingTable`])
//!
//! plus the typed addresses exchanged between them.

pub mod address;
mod frame;
mod mapper;
mod pool;

pub use address::{PhysAddr, VirtAddr, VirtRange, PAGE_SHIFT, PAGE_SIZE};
pub use frame::{BackingStore, FrameSource, GlobalFrames};
pub use mapper::{MappingEntry, MappingError, MappingTable, Protection, RegionMapper};
pub use pool::RegionPool;
