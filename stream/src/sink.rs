// Licensed under the Apache-2.0 license

use suit_types::{SuitError, SuitResult};

/// Push-style byte consumer.
///
/// `write` returns the number of bytes consumed; partial-capacity backends
/// may consume fewer than offered and callers loop until done. The optional
/// operations default to [`SuitError::UnsupportedCommand`]; a backend
/// implements only what its backing store supports.
pub trait StreamSink {
    /// Consume up to `data.len()` bytes at the current cursor. A write that
    /// cannot make any progress because it would exceed the sink's limit
    /// fails with [`SuitError::SizeLimit`].
    fn write(&mut self, data: &[u8]) -> SuitResult<usize>;

    /// Move the write cursor to an absolute offset.
    fn seek(&mut self, _offset: usize) -> SuitResult<()> {
        Err(SuitError::UnsupportedCommand)
    }

    /// Erase the sink's backing region.
    fn erase(&mut self) -> SuitResult<()> {
        Err(SuitError::UnsupportedCommand)
    }

    /// Push any buffered bytes to the backing store.
    fn flush(&mut self) -> SuitResult<()> {
        Ok(())
    }

    /// Number of bytes the sink has accepted so far.
    fn used_storage(&self) -> SuitResult<usize> {
        Err(SuitError::UnsupportedCommand)
    }
}
