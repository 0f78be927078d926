// Licensed under the Apache-2.0 license

//! Update candidate staging record.
//!
//! The record lives in its own erase-block-aligned region and is only ever
//! mutated by erasing the whole region and rewriting the record, so a crash
//! leaves either the old record or an empty region.

use suit_types::{MemRegion, SuitError, SuitResult};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Candidate staged as a CBOR envelope plus optional cache regions.
pub const UPDATE_MAGIC_AVAILABLE_CBOR: u32 = 0x55AA55AA;
/// Erased region.
pub const UPDATE_MAGIC_EMPTY: u32 = 0xFFFF_FFFF;

pub const MAX_UPDATE_REGIONS: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RawRegion {
    pub addr: u32,
    pub size: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct UpdateCandidateInfo {
    pub magic: u32,
    pub regions_len: u32,
    pub regions: [RawRegion; MAX_UPDATE_REGIONS],
}

impl UpdateCandidateInfo {
    pub fn decode(bytes: &[u8]) -> SuitResult<UpdateCandidateInfo> {
        UpdateCandidateInfo::read_from_prefix(bytes)
            .map(|(info, _)| info)
            .map_err(|_| SuitError::Decoding)
    }

    /// Build a record from staged regions. An empty list clears the
    /// candidate: the magic stays stamped with a region count of zero.
    pub fn from_regions(regions: &[MemRegion]) -> SuitResult<UpdateCandidateInfo> {
        if regions.len() > MAX_UPDATE_REGIONS {
            return Err(SuitError::InvalidParameter);
        }
        if let Some(first) = regions.first() {
            if first.is_empty() {
                return Err(SuitError::InvalidParameter);
            }
        }

        let mut info = UpdateCandidateInfo {
            magic: UPDATE_MAGIC_AVAILABLE_CBOR,
            regions_len: regions.len() as u32,
            regions: [RawRegion { addr: 0, size: 0 }; MAX_UPDATE_REGIONS],
        };
        for (raw, region) in info.regions.iter_mut().zip(regions.iter()) {
            raw.addr = u32::try_from(region.addr).map_err(|_| SuitError::InvalidParameter)?;
            raw.size = u32::try_from(region.size).map_err(|_| SuitError::InvalidParameter)?;
        }
        Ok(info)
    }

    /// Validity gate: a candidate exists only if the magic is stamped, at
    /// least one region is recorded, and the first region is non-empty.
    pub fn regions(&self, out: &mut [MemRegion]) -> SuitResult<usize> {
        let count = self.regions_len as usize;
        if self.magic != UPDATE_MAGIC_AVAILABLE_CBOR
            || count < 1
            || count > MAX_UPDATE_REGIONS
            || self.regions[0].addr == 0
            || self.regions[0].size == 0
        {
            return Err(SuitError::NotFound);
        }
        if out.len() < count {
            return Err(SuitError::SizeLimit);
        }
        for (slot, raw) in out.iter_mut().zip(self.regions[..count].iter()) {
            *slot = MemRegion::new(raw.addr as usize, raw.size as usize);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    #[test]
    fn test_round_trip() {
        let staged = [MemRegion::new(0x1000, 0x400), MemRegion::new(0x2000, 0x100)];
        let info = UpdateCandidateInfo::from_regions(&staged).unwrap();
        let decoded = UpdateCandidateInfo::decode(info.as_bytes()).unwrap();

        let mut out = [MemRegion::default(); MAX_UPDATE_REGIONS];
        let count = decoded.regions(&mut out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(&out[..2], &staged);
    }

    #[test]
    fn test_validity_gate_each_condition() {
        let staged = [MemRegion::new(0x1000, 0x400)];
        let mut out = [MemRegion::default(); MAX_UPDATE_REGIONS];

        // Wrong magic.
        let mut info = UpdateCandidateInfo::from_regions(&staged).unwrap();
        info.magic = UPDATE_MAGIC_EMPTY;
        assert_eq!(info.regions(&mut out), Err(SuitError::NotFound));

        // Zero region count (a cleared candidate).
        let info = UpdateCandidateInfo::from_regions(&[]).unwrap();
        assert_eq!(info.regions(&mut out), Err(SuitError::NotFound));

        // Null first region.
        let mut info = UpdateCandidateInfo::from_regions(&staged).unwrap();
        info.regions[0].addr = 0;
        assert_eq!(info.regions(&mut out), Err(SuitError::NotFound));

        // Zero-sized first region.
        let mut info = UpdateCandidateInfo::from_regions(&staged).unwrap();
        info.regions[0].size = 0;
        assert_eq!(info.regions(&mut out), Err(SuitError::NotFound));
    }

    #[test]
    fn test_from_regions_rejects_bad_input() {
        assert_eq!(
            UpdateCandidateInfo::from_regions(&[MemRegion::new(0, 0x100)]),
            Err(SuitError::InvalidParameter)
        );
        let too_many = [MemRegion::new(0x1000, 1); MAX_UPDATE_REGIONS + 1];
        assert_eq!(
            UpdateCandidateInfo::from_regions(&too_many),
            Err(SuitError::InvalidParameter)
        );
    }

    #[test]
    fn test_erased_region_is_not_a_candidate() {
        let erased = [0xFFu8; core::mem::size_of::<UpdateCandidateInfo>()];
        let info = UpdateCandidateInfo::decode(&erased).unwrap();
        let mut out = [MemRegion::default(); MAX_UPDATE_REGIONS];
        assert_eq!(info.magic, UPDATE_MAGIC_EMPTY);
        assert_eq!(info.regions(&mut out), Err(SuitError::NotFound));
    }
}
