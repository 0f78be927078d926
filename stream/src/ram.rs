// Licensed under the Apache-2.0 license

use crate::sink::StreamSink;
use suit_types::{SuitError, SuitResult};

/// Sink writing into a caller-provided RAM buffer.
pub struct RamSink<'a> {
    buf: &'a mut [u8],
    offset: usize,
    used: usize,
}

impl<'a> RamSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> RamSink<'a> {
        RamSink {
            buf,
            offset: 0,
            used: 0,
        }
    }
}

impl StreamSink for RamSink<'_> {
    fn write(&mut self, data: &[u8]) -> SuitResult<usize> {
        let end = self
            .offset
            .checked_add(data.len())
            .ok_or(SuitError::SizeLimit)?;
        if end > self.buf.len() {
            return Err(SuitError::SizeLimit);
        }
        self.buf[self.offset..end].copy_from_slice(data);
        self.offset = end;
        self.used = self.used.max(end);
        Ok(data.len())
    }

    fn seek(&mut self, offset: usize) -> SuitResult<()> {
        if offset > self.buf.len() {
            return Err(SuitError::SizeLimit);
        }
        self.offset = offset;
        Ok(())
    }

    fn erase(&mut self) -> SuitResult<()> {
        self.buf.fill(0);
        self.offset = 0;
        self.used = 0;
        Ok(())
    }

    fn used_storage(&self) -> SuitResult<usize> {
        Ok(self.used)
    }
}
