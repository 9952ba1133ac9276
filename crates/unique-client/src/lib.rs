//! Client library for `org.freedesktop.portal.Unique` (spec §4.5/§4.6).
//!
//! Callers never see a dedup failure: [`submit`] and [`submit_async`]
//! always return a usable [`Buffer`], falling back to a private heap copy
//! whenever anything on the dedup path — memfd creation, sealing, the bus
//! call, mapping — fails.

#![warn(missing_docs)]
// The workspace denies unsafe code by default; this crate is the one
// place that genuinely needs it (mmap/memfd are inherently unsafe
// syscalls with no safe wrapper that fits spec §4.5/§4.6's fixed-address
// remap requirement).
#![allow(unsafe_code)]

mod buffer;
mod client;
mod error;
mod mapping;
mod memfile;

pub use buffer::Buffer;
pub use client::{submit, submit_async, DEFAULT_TIMEOUT};
