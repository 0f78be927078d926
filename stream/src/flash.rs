// Licensed under the Apache-2.0 license

//! Flash-backed sink with read-modify-write alignment handling.

use crate::sink::StreamSink;
use suit_flash::{SuitFlash, MAX_WRITE_BLOCK};
use suit_types::{SuitError, SuitResult};

/// Splice `data` into flash at an arbitrary byte offset.
///
/// Writes must land on write-block boundaries, so the unaligned head and
/// tail are handled by reading the containing block, patching the affected
/// bytes, and writing the whole block back. The aligned body goes straight
/// from the input. Each piece is an independent block-granular write.
fn write_spliced<F: SuitFlash>(flash: &mut F, offset: usize, mut data: &[u8]) -> SuitResult<()> {
    let wbs = flash.write_block_size();
    if wbs > MAX_WRITE_BLOCK {
        return Err(SuitError::InvalidParameter);
    }
    if wbs <= 1 {
        flash.write(offset, data)?;
        return Ok(());
    }

    let mut cursor = offset;
    let mut block = [0u8; MAX_WRITE_BLOCK];

    // Unaligned head: patch the containing block.
    let head = cursor % wbs;
    if head != 0 {
        let block_start = cursor - head;
        let len = (wbs - head).min(data.len());
        flash.read(block_start, &mut block[..wbs])?;
        block[head..head + len].copy_from_slice(&data[..len]);
        flash.write(block_start, &block[..wbs])?;
        cursor += len;
        data = &data[len..];
    }

    // Aligned body.
    let body = (data.len() / wbs) * wbs;
    if body > 0 {
        flash.write(cursor, &data[..body])?;
        cursor += body;
        data = &data[body..];
    }

    // Unaligned tail: patch the final block.
    if !data.is_empty() {
        flash.read(cursor, &mut block[..wbs])?;
        block[..data.len()].copy_from_slice(data);
        flash.write(cursor, &block[..wbs])?;
    }
    Ok(())
}

/// Sink writing into a fixed window of a flash device.
pub struct FlashSink<'a, F: SuitFlash> {
    flash: &'a mut F,
    base: usize,
    limit: usize,
    offset: usize,
    used: usize,
}

impl<'a, F: SuitFlash> FlashSink<'a, F> {
    pub fn new(flash: &'a mut F, base: usize, limit: usize) -> SuitResult<FlashSink<'a, F>> {
        let end = base.checked_add(limit).ok_or(SuitError::InvalidParameter)?;
        if end > flash.size() {
            return Err(SuitError::InvalidParameter);
        }
        Ok(FlashSink {
            flash,
            base,
            limit,
            offset: 0,
            used: 0,
        })
    }
}

impl<F: SuitFlash> StreamSink for FlashSink<'_, F> {
    fn write(&mut self, data: &[u8]) -> SuitResult<usize> {
        let end = self
            .offset
            .checked_add(data.len())
            .ok_or(SuitError::SizeLimit)?;
        if end > self.limit {
            return Err(SuitError::SizeLimit);
        }
        write_spliced(self.flash, self.base + self.offset, data)?;
        self.offset = end;
        self.used = self.used.max(end);
        Ok(data.len())
    }

    fn seek(&mut self, offset: usize) -> SuitResult<()> {
        if offset > self.limit {
            return Err(SuitError::SizeLimit);
        }
        self.offset = offset;
        Ok(())
    }

    fn erase(&mut self) -> SuitResult<()> {
        self.flash.erase(self.base, self.limit)?;
        self.offset = 0;
        self.used = 0;
        Ok(())
    }

    fn used_storage(&self) -> SuitResult<usize> {
        Ok(self.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suit_flash::RamFlash;

    #[test]
    fn test_splice_unaligned_head() {
        let mut flash: RamFlash<32> = RamFlash::new(4, 16);
        flash.program(0, &[0x10; 8]);
        write_spliced(&mut flash, 2, &[0xAA, 0xBB]).unwrap();
        assert_eq!(
            &flash.mapped()[..8],
            &[0x10, 0x10, 0xAA, 0xBB, 0x10, 0x10, 0x10, 0x10]
        );
    }

    #[test]
    fn test_splice_unaligned_tail() {
        let mut flash: RamFlash<32> = RamFlash::new(4, 16);
        flash.program(0, &[0x10; 8]);
        write_spliced(&mut flash, 0, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(&flash.mapped()[..8], &[1, 2, 3, 4, 5, 6, 0x10, 0x10]);
    }

    #[test]
    fn test_splice_head_body_and_tail() {
        let mut flash: RamFlash<32> = RamFlash::new(4, 16);
        flash.program(0, &[0x10; 16]);
        let data: [u8; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        write_spliced(&mut flash, 3, &data).unwrap();
        assert_eq!(&flash.mapped()[..3], &[0x10; 3]);
        assert_eq!(&flash.mapped()[3..12], &data);
        assert_eq!(&flash.mapped()[12..16], &[0x10; 4]);
    }

    #[test]
    fn test_splice_within_single_block() {
        let mut flash: RamFlash<32> = RamFlash::new(8, 16);
        flash.program(0, &[0x10; 8]);
        write_spliced(&mut flash, 3, &[0xAA, 0xBB]).unwrap();
        let mut expected = [0x10u8; 8];
        expected[3] = 0xAA;
        expected[4] = 0xBB;
        assert_eq!(&flash.mapped()[..8], &expected);
    }

    #[test]
    fn test_sink_write_and_limit() {
        let mut flash: RamFlash<64> = RamFlash::new(4, 16);
        let mut sink = FlashSink::new(&mut flash, 16, 16).unwrap();
        assert_eq!(sink.write(&[1, 2, 3, 4, 5]), Ok(5));
        assert_eq!(sink.used_storage(), Ok(5));
        assert_eq!(sink.write(&[0; 12]), Err(SuitError::SizeLimit));
        assert_eq!(&flash.mapped()[16..21], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sink_seek_does_not_corrupt_neighbors() {
        let mut flash: RamFlash<64> = RamFlash::new(4, 16);
        let mut sink = FlashSink::new(&mut flash, 0, 16).unwrap();
        sink.write(&[0x11; 8]).unwrap();
        sink.seek(2).unwrap();
        sink.write(&[0xAA]).unwrap();
        assert_eq!(flash.mapped()[1], 0x11);
        assert_eq!(flash.mapped()[2], 0xAA);
        assert_eq!(flash.mapped()[3], 0x11);
    }
}
