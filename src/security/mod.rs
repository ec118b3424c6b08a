//! Security Primitives Module
//!
//! Released backing stores are scrubbed before their frames go back to the
//! source, so a later allocation never observes a previous object's bytes.
//!
//! # Security Properties
//! - Memory is cleared using volatile writes to prevent optimization

pub mod zeroize;

pub use zeroize::Zeroize;
