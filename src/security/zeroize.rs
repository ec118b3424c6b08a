//! Secure Memory Zeroization
//!
//! Backing stores are scrubbed before their frames go back to the source,
//! so a recycled frame never leaks a previous object's contents.
//!
//! # Design
//! - `Zeroize` trait for types that can be securely cleared
//! - Volatile writes prevent compiler optimization of zeroing

use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

/// Trait for types that can be securely zeroed.
///
/// Implementations must ensure that all data is overwritten with zeros in
/// a way that cannot be optimized away.
pub trait Zeroize {
    /// Overwrite this value with zeros.
    fn zeroize(&mut self);
}

impl Zeroize for [u8] {
    fn zeroize(&mut self) {
        // SAFETY: We have a valid mutable reference to the slice
        unsafe {
            volatile_set_memory(self.as_mut_ptr(), 0, self.len());
        }
        compiler_fence(Ordering::SeqCst);
    }
}

/// Volatile memset that cannot be optimized away.
///
/// # Safety
/// - `dst` must be valid for writes of `count` bytes
#[inline]
unsafe fn volatile_set_memory(dst: *mut u8, val: u8, count: usize) {
    for i in 0..count {
        // SAFETY: Caller guarantees dst is valid for count bytes
        unsafe {
            ptr::write_volatile(dst.add(i), val);
        }
    }
}
