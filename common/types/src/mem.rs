// Licensed under the Apache-2.0 license

/// Contiguous byte range in device address space. A view descriptor, not an
/// owner; resolution to bytes goes through the flash mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemRegion {
    pub addr: usize,
    pub size: usize,
}

impl MemRegion {
    pub const fn new(addr: usize, size: usize) -> MemRegion {
        MemRegion { addr, size }
    }

    /// A region is empty if it points nowhere or covers nothing.
    pub fn is_empty(&self) -> bool {
        self.addr == 0 || self.size == 0
    }
}
