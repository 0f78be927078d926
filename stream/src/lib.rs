// Licensed under the Apache-2.0 license

//! Streaming sinks and sources for payload movement and verification.
//!
//! A [`StreamSink`] is a push-style consumer; streamers pair a byte source
//! (an in-memory buffer, a cache lookup, or a remote fetch collaborator)
//! with a sink and drive the transfer to completion.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod cache;
pub mod digest;
mod flash;
mod ram;
mod sink;
mod streamer;

pub use cache::{CachePool, CacheSlot};
pub use digest::{DigestAlgorithm, DigestSink, DigestVerdict};
pub use flash::FlashSink;
pub use ram::RamSink;
pub use sink::StreamSink;
pub use streamer::{stream_cache, stream_memptr, FetchSource};
