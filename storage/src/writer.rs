// Licensed under the Apache-2.0 license

//! Write-block buffered appender for envelope slots.
//!
//! The severed envelope is rebuilt from several unaligned pieces (header,
//! authentication wrapper, manifest); this writer accepts arbitrary slices
//! and issues only write-block-aligned flash transactions.

use suit_flash::{SuitFlash, MAX_WRITE_BLOCK};
use suit_types::{SuitError, SuitResult};

pub(crate) struct SlotWriter<'a, F: SuitFlash> {
    flash: &'a mut F,
    base: usize,
    capacity: usize,
    buf: [u8; MAX_WRITE_BLOCK],
    fill: usize,
    offset: usize,
}

impl<'a, F: SuitFlash> SlotWriter<'a, F> {
    /// Erase the slot and start appending from its beginning.
    pub(crate) fn new(flash: &'a mut F, base: usize, capacity: usize) -> SuitResult<Self> {
        if flash.write_block_size() > MAX_WRITE_BLOCK {
            return Err(SuitError::InvalidParameter);
        }
        flash.erase(base, capacity)?;
        Ok(SlotWriter {
            flash,
            base,
            capacity,
            buf: [0xFF; MAX_WRITE_BLOCK],
            fill: 0,
            offset: 0,
        })
    }

    pub(crate) fn append(&mut self, mut data: &[u8]) -> SuitResult<()> {
        let wbs = self.flash.write_block_size();
        if self.offset + self.fill + data.len() > self.capacity {
            return Err(SuitError::SizeLimit);
        }

        // Top up the partial block left over from the previous call.
        if self.fill > 0 {
            let len = (wbs - self.fill).min(data.len());
            self.buf[self.fill..self.fill + len].copy_from_slice(&data[..len]);
            self.fill += len;
            data = &data[len..];

            if self.fill == wbs {
                self.flash
                    .write(self.base + self.offset, &self.buf[..wbs])?;
                self.fill = 0;
                self.offset += wbs;
            }
        }

        // Aligned body straight from the input.
        let body = (data.len() / wbs) * wbs;
        if body > 0 {
            self.flash.write(self.base + self.offset, &data[..body])?;
            self.offset += body;
            data = &data[body..];
        }

        // Keep the unaligned tail for the next call.
        if !data.is_empty() {
            self.buf[self.fill..self.fill + data.len()].copy_from_slice(data);
            self.fill += data.len();
        }
        Ok(())
    }

    /// Write out any buffered bytes, padded with the erase value.
    pub(crate) fn flush(&mut self) -> SuitResult<()> {
        let wbs = self.flash.write_block_size();
        if self.fill > 0 && wbs > 1 {
            self.buf[self.fill..wbs].fill(0xFF);
            self.flash
                .write(self.base + self.offset, &self.buf[..wbs])?;
            self.fill = 0;
            self.offset += wbs;
        }
        Ok(())
    }
}
