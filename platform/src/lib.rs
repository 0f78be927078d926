// Licensed under the Apache-2.0 license

//! Platform component dispatch.
//!
//! Decoded component ids are bound to live component slots in a fixed-size
//! table; each slot routes reads, writes, and invocations to the backend
//! selected by the component type. Handles carry a generation counter so a
//! stale handle is rejected instead of touching a recycled slot.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod checks;
pub mod digest_cache;
mod memptr;
mod table;

pub use digest_cache::DigestCache;
pub use memptr::{MemptrStorage, MAX_MEMPTR_RECORDS};
pub use table::{ComponentHandle, ComponentTable, MemBackend, WriteMode, MAX_COMPONENTS};
