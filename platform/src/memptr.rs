// Licensed under the Apache-2.0 license

//! Bounded pool of memory-pointer records backing candidate components.
//!
//! A record holds the location of a staged payload as a device-address
//! region. Each record has exactly one owner, the component slot that
//! allocated it.

use suit_types::{MemRegion, SuitError, SuitResult};

pub const MAX_MEMPTR_RECORDS: usize = 8;

#[derive(Debug, Clone, Copy)]
struct MemptrRecord {
    in_use: bool,
    region: Option<MemRegion>,
}

#[derive(Debug)]
pub struct MemptrStorage {
    records: [MemptrRecord; MAX_MEMPTR_RECORDS],
}

impl MemptrStorage {
    pub const fn new() -> MemptrStorage {
        MemptrStorage {
            records: [MemptrRecord {
                in_use: false,
                region: None,
            }; MAX_MEMPTR_RECORDS],
        }
    }

    pub fn allocate(&mut self) -> SuitResult<usize> {
        match self.records.iter().position(|r| !r.in_use) {
            Some(index) => {
                self.records[index].in_use = true;
                self.records[index].region = None;
                Ok(index)
            }
            None => Err(SuitError::NoResources),
        }
    }

    pub fn release(&mut self, index: usize) -> SuitResult<()> {
        let record = self
            .records
            .get_mut(index)
            .filter(|r| r.in_use)
            .ok_or(SuitError::InvalidParameter)?;
        record.in_use = false;
        record.region = None;
        Ok(())
    }

    pub fn store(&mut self, index: usize, region: MemRegion) -> SuitResult<()> {
        if region.is_empty() {
            return Err(SuitError::InvalidParameter);
        }
        let record = self
            .records
            .get_mut(index)
            .filter(|r| r.in_use)
            .ok_or(SuitError::InvalidParameter)?;
        record.region = Some(region);
        Ok(())
    }

    /// Stored region, or `None` if nothing has been staged yet.
    pub fn get(&self, index: usize) -> SuitResult<Option<MemRegion>> {
        self.records
            .get(index)
            .filter(|r| r.in_use)
            .map(|r| r.region)
            .ok_or(SuitError::InvalidParameter)
    }
}

impl Default for MemptrStorage {
    fn default() -> Self {
        MemptrStorage::new()
    }
}
