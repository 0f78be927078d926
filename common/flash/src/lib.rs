// Licensed under the Apache-2.0 license

//! Flash driver seam used by the storage and streaming layers.
//!
//! The device is assumed to be memory-mapped for reads (MRAM semantics):
//! [`SuitFlash::mapped`] exposes the whole device as a byte slice, while
//! mutations go through [`SuitFlash::write`] and [`SuitFlash::erase`]. Erase
//! sets bytes to `0xFF`; writes are only valid to previously-erased regions
//! at write-block granularity.

#![cfg_attr(target_arch = "riscv32", no_std)]

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    OutOfBounds,
    /// Offset or length violates the device's block granularity.
    Unaligned,
    Io,
}

pub type FlashResult<T> = Result<T, FlashError>;

impl From<FlashError> for suit_types::SuitError {
    fn from(err: FlashError) -> suit_types::SuitError {
        match err {
            FlashError::OutOfBounds => suit_types::SuitError::OutOfBounds,
            FlashError::Unaligned | FlashError::Io => suit_types::SuitError::Crash,
        }
    }
}

pub const ERASE_VALUE: u8 = 0xFF;

/// Largest write block any supported device uses; sized so callers can keep
/// a block-assembly buffer on the stack.
pub const MAX_WRITE_BLOCK: usize = 16;

pub trait SuitFlash {
    /// Smallest programmable unit in bytes.
    fn write_block_size(&self) -> usize;

    /// Smallest erasable unit in bytes.
    fn erase_block_size(&self) -> usize;

    /// Total device size in bytes.
    fn size(&self) -> usize;

    /// Memory-mapped view of the whole device.
    fn mapped(&self) -> &[u8];

    fn read(&self, offset: usize, buf: &mut [u8]) -> FlashResult<()> {
        let end = offset.checked_add(buf.len()).ok_or(FlashError::OutOfBounds)?;
        if end > self.size() {
            return Err(FlashError::OutOfBounds);
        }
        buf.copy_from_slice(&self.mapped()[offset..end]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> FlashResult<()>;

    fn erase(&mut self, offset: usize, len: usize) -> FlashResult<()>;
}

/// RAM-backed flash device for host tests.
pub struct RamFlash<const SIZE: usize> {
    mem: [u8; SIZE],
    write_block_size: usize,
    erase_block_size: usize,
}

impl<const SIZE: usize> RamFlash<SIZE> {
    pub fn new(write_block_size: usize, erase_block_size: usize) -> Self {
        RamFlash {
            mem: [ERASE_VALUE; SIZE],
            write_block_size,
            erase_block_size,
        }
    }

    /// Preload raw contents, bypassing write constraints.
    pub fn program(&mut self, offset: usize, data: &[u8]) {
        self.mem[offset..offset + data.len()].copy_from_slice(data);
    }
}

impl<const SIZE: usize> SuitFlash for RamFlash<SIZE> {
    fn write_block_size(&self) -> usize {
        self.write_block_size
    }

    fn erase_block_size(&self) -> usize {
        self.erase_block_size
    }

    fn size(&self) -> usize {
        SIZE
    }

    fn mapped(&self) -> &[u8] {
        &self.mem
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> FlashResult<()> {
        let end = offset.checked_add(data.len()).ok_or(FlashError::OutOfBounds)?;
        if end > SIZE {
            return Err(FlashError::OutOfBounds);
        }
        if offset % self.write_block_size != 0 || data.len() % self.write_block_size != 0 {
            return Err(FlashError::Unaligned);
        }
        self.mem[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn erase(&mut self, offset: usize, len: usize) -> FlashResult<()> {
        let end = offset.checked_add(len).ok_or(FlashError::OutOfBounds)?;
        if end > SIZE {
            return Err(FlashError::OutOfBounds);
        }
        if offset % self.erase_block_size != 0 || len % self.erase_block_size != 0 {
            return Err(FlashError::Unaligned);
        }
        self.mem[offset..end].fill(ERASE_VALUE);
        Ok(())
    }
}
