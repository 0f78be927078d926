// Licensed under the Apache-2.0 license

//! Streamers pairing a byte source with a sink.

use crate::sink::StreamSink;
use suit_types::{SuitError, SuitResult};

/// Stream an in-memory payload into a sink, looping over partial writes.
pub fn stream_memptr(payload: &[u8], sink: &mut dyn StreamSink) -> SuitResult<()> {
    let mut remaining = payload;
    while !remaining.is_empty() {
        let consumed = sink.write(remaining)?;
        if consumed == 0 {
            // A sink that accepts nothing without erroring would loop
            // forever.
            return Err(SuitError::Crash);
        }
        remaining = &remaining[consumed..];
    }
    Ok(())
}

/// Resolve `uri` across the cache partitions and stream the hit into `sink`.
pub fn stream_cache(
    partitions: &[&[u8]],
    uri: &[u8],
    sink: &mut dyn StreamSink,
) -> SuitResult<()> {
    let payload = crate::cache::search(partitions, uri)?;
    stream_memptr(payload, sink)
}

/// Remote payload source, e.g. an IPC fetch served by another core.
///
/// The transport delivers chunks on its own schedule; implementations push
/// them into `sink` and return once the payload is complete or the
/// transport gave up.
pub trait FetchSource {
    fn fetch(&mut self, uri: &[u8], sink: &mut dyn StreamSink) -> SuitResult<()>;
}
