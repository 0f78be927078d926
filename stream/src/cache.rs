// Licensed under the Apache-2.0 license

//! Payload cache partitions.
//!
//! A partition is an indefinite-length CBOR map of `{tstr uri: bstr payload}`
//! pairs. The stop byte equals the flash erase value, so the first erased
//! byte after the last committed pair terminates the map; an initialized but
//! empty partition is just the map head followed by erased bytes.

use crate::sink::StreamSink;
use suit_cbor::Decoder;
use suit_types::{SuitError, SuitResult};

/// Byte-string head reserving a four-byte length, patched on commit.
const SLOT_BSTR_HEAD: u8 = 0x5A;
const SLOT_HEAD_LEN: usize = 5;

const MAP_INDEFINITE_HEAD: u8 = 0xBF;

/// Strip one trailing NUL so C-string and raw-slice queries compare alike.
fn uri_trim(uri: &[u8]) -> &[u8] {
    match uri.split_last() {
        Some((0, rest)) => rest,
        _ => uri,
    }
}

fn search_partition<'a>(partition: &'a [u8], uri: &[u8]) -> SuitResult<Option<&'a [u8]>> {
    let mut dec = Decoder::new(partition);
    dec.map_header()?;
    loop {
        if dec.peek_break()? {
            return Ok(None);
        }
        let key = dec.tstr()?;
        let payload = dec.bstr()?;
        // Exact equality only; a prefix of a longer key never matches.
        if uri_trim(key) == uri_trim(uri) {
            return Ok(Some(payload));
        }
    }
}

/// Look up `uri` across cache partitions; first exact match wins.
///
/// A malformed partition aborts its own scan only, the remaining partitions
/// are still searched.
pub fn search<'a>(partitions: &[&'a [u8]], uri: &[u8]) -> SuitResult<&'a [u8]> {
    for (index, partition) in partitions.iter().enumerate() {
        match search_partition(partition, uri) {
            Ok(Some(payload)) => return Ok(payload),
            Ok(None) => {}
            Err(_) => {
                log::warn!("cache partition {index} is malformed, skipping");
            }
        }
    }
    Err(SuitError::NotFound)
}

/// Writable cache partition over a RAM or memory-mapped staging buffer.
pub struct CachePool<'a> {
    buf: &'a mut [u8],
}

impl<'a> CachePool<'a> {
    /// Format `buf` as an empty partition.
    pub fn init(buf: &'a mut [u8]) -> SuitResult<CachePool<'a>> {
        if buf.len() < 2 {
            return Err(SuitError::SizeLimit);
        }
        buf.fill(0xFF);
        buf[0] = MAP_INDEFINITE_HEAD;
        Ok(CachePool { buf })
    }

    /// Adopt a buffer already holding a well-formed partition.
    pub fn from_initialized(buf: &'a mut [u8]) -> SuitResult<CachePool<'a>> {
        if buf.first() != Some(&MAP_INDEFINITE_HEAD) {
            return Err(SuitError::Decoding);
        }
        let pool = CachePool { buf };
        pool.end_offset()?;
        Ok(pool)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf
    }

    /// Offset of the first erased byte after the last committed pair.
    fn end_offset(&self) -> SuitResult<usize> {
        let mut dec = Decoder::new(self.buf);
        dec.map_header()?;
        loop {
            if dec.peek_break()? {
                return Ok(dec.position());
            }
            dec.tstr()?;
            dec.bstr()?;
        }
    }

    /// Open a slot for `uri`. A key already present in the partition is
    /// rejected. The key and a placeholder payload head are
    /// written immediately; the payload length is patched in on commit.
    /// Dropping the slot without committing restores the partition exactly.
    pub fn allocate<'p>(&'p mut self, uri: &[u8]) -> SuitResult<CacheSlot<'p>> {
        let uri = uri_trim(uri);
        if uri.is_empty() {
            return Err(SuitError::InvalidParameter);
        }
        if search_partition(self.buf, uri)?.is_some() {
            return Err(SuitError::AlreadyExists);
        }
        let end = self.end_offset()?;

        let key_len = suit_cbor::head_len(uri.len() as u64) + uri.len();
        // One erased byte must remain after the payload to stop the map.
        if end + key_len + SLOT_HEAD_LEN + 1 > self.buf.len() {
            return Err(SuitError::SizeLimit);
        }

        let mut enc = suit_cbor::Encoder::new(&mut self.buf[end..]);
        enc.tstr(uri).map_err(|_| SuitError::SizeLimit)?;
        enc.raw(&[SLOT_BSTR_HEAD, 0xFF, 0xFF, 0xFF, 0xFF])
            .map_err(|_| SuitError::SizeLimit)?;
        let data_start = end + enc.position();

        Ok(CacheSlot {
            buf: self.buf,
            slot_start: end,
            data_start,
            size: 0,
            committed: false,
        })
    }
}

/// An open, not-yet-committed cache slot. Acts as a sink for the payload.
pub struct CacheSlot<'a> {
    buf: &'a mut [u8],
    slot_start: usize,
    data_start: usize,
    size: usize,
    committed: bool,
}

impl CacheSlot<'_> {
    /// Finalize the slot: the placeholder length head becomes the real
    /// payload length and the erased byte after the payload stops the map.
    pub fn commit(mut self) -> SuitResult<()> {
        let len = u32::try_from(self.size).map_err(|_| SuitError::SizeLimit)?;
        self.buf[self.data_start - 4..self.data_start].copy_from_slice(&len.to_be_bytes());
        // The stop byte is written, not assumed: an adopted buffer may hold
        // residue past the old end marker.
        self.buf[self.data_start + self.size] = 0xFF;
        self.committed = true;
        Ok(())
    }
}

impl StreamSink for CacheSlot<'_> {
    fn write(&mut self, data: &[u8]) -> SuitResult<usize> {
        let end = self
            .data_start
            .checked_add(self.size)
            .and_then(|c| c.checked_add(data.len()))
            .ok_or(SuitError::SizeLimit)?;
        if end + 1 > self.buf.len() {
            return Err(SuitError::SizeLimit);
        }
        self.buf[self.data_start + self.size..end].copy_from_slice(data);
        self.size += data.len();
        Ok(data.len())
    }

    fn used_storage(&self) -> SuitResult<usize> {
        Ok(self.size)
    }
}

impl Drop for CacheSlot<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.buf[self.slot_start..self.data_start + self.size].fill(0xFF);
        }
    }
}
