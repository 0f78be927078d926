// Licensed under the Apache-2.0 license

//! Component slot table and backend dispatch.

use crate::memptr::MemptrStorage;
use suit_flash::SuitFlash;
use suit_mci::{Mci, UNSPECIFIED_CLASS_ID};
use suit_stream::{stream_memptr, FlashSink, StreamSink};
use suit_types::{
    decode_component_id, decode_component_type, ComponentType, ManifestClassId,
    MemComponentInfo, MemRegion, SuitError, SuitResult, Uuid,
};

pub const MAX_COMPONENTS: usize = 8;

const MAX_CLASS_IDS: usize = 8;

/// Capacity of the RAM buffer standing in for a memory component on hosts
/// without a memory-mapped firmware area.
const RAMBUF_CAPACITY: usize = 256;

/// Memory-component backend selection. Flash is the real device mapping;
/// the RAM buffer serves host test builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemBackend {
    Flash,
    RamBuf,
}

/// Whether a write takes effect or only records its sizing effects.
///
/// Dry runs let a whole command sequence be validated before any byte of
/// storage changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Real,
    DryRun,
}

/// Opaque reference to a live component slot. Stale handles, including
/// handles to a released-and-reused slot, are rejected by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentHandle {
    index: usize,
    generation: u32,
}

enum Backend {
    MemFlash { info: MemComponentInfo },
    MemRam { info: MemComponentInfo, buf: [u8; RAMBUF_CAPACITY] },
    Candidate { record: usize },
}

struct ComponentState<'a> {
    component_id: &'a [u8],
    backend: Backend,
    /// Bytes actually present and readable.
    read_size: usize,
    /// Bytes a dry-run pass would have produced.
    dry_read_size: usize,
}

struct Slot<'a> {
    generation: u32,
    state: Option<ComponentState<'a>>,
}

pub struct ComponentTable<'a> {
    slots: [Slot<'a>; MAX_COMPONENTS],
    memptr: MemptrStorage,
    mem_backend: MemBackend,
}

fn clamp_read(read_size: usize, offset: usize, want: usize) -> SuitResult<usize> {
    if offset > read_size {
        return Err(SuitError::UnavailablePayload);
    }
    Ok(want.min(read_size - offset))
}

impl<'a> ComponentTable<'a> {
    pub fn new(mem_backend: MemBackend) -> ComponentTable<'a> {
        ComponentTable {
            slots: core::array::from_fn(|_| Slot {
                generation: 0,
                state: None,
            }),
            memptr: MemptrStorage::new(),
            mem_backend,
        }
    }

    /// Decode `component_id`, select a backend, and bind a free slot to it.
    pub fn create(&mut self, component_id: &'a [u8]) -> SuitResult<ComponentHandle> {
        let backend = match decode_component_type(component_id)? {
            ComponentType::Mem => {
                let info = decode_component_id(component_id)?;
                match self.mem_backend {
                    MemBackend::Flash => Backend::MemFlash { info },
                    MemBackend::RamBuf => {
                        if info.size > RAMBUF_CAPACITY {
                            return Err(SuitError::NoResources);
                        }
                        Backend::MemRam {
                            info,
                            buf: [0; RAMBUF_CAPACITY],
                        }
                    }
                }
            }
            ComponentType::CandImg | ComponentType::CandManifest => Backend::Candidate {
                record: self.memptr.allocate()?,
            },
            _ => return Err(SuitError::UnsupportedComponentId),
        };

        let index = match self.slots.iter().position(|slot| slot.state.is_none()) {
            Some(index) => index,
            None => {
                if let Backend::Candidate { record } = backend {
                    self.memptr.release(record)?;
                }
                return Err(SuitError::NoResources);
            }
        };

        // Flash-mapped firmware is already in place; everything else starts
        // empty.
        let read_size = match &backend {
            Backend::MemFlash { info } => info.size,
            _ => 0,
        };
        self.slots[index].state = Some(ComponentState {
            component_id,
            backend,
            read_size,
            dry_read_size: read_size,
        });
        Ok(ComponentHandle {
            index,
            generation: self.slots[index].generation,
        })
    }

    /// Free the slot. The handle and any copies of it become unusable.
    pub fn release(&mut self, handle: ComponentHandle) -> SuitResult<()> {
        let state = self.resolve(handle)?;
        if let Backend::Candidate { record } = state.backend {
            self.memptr.release(record)?;
        }
        let slot = &mut self.slots[handle.index];
        slot.state = None;
        slot.generation = slot.generation.wrapping_add(1);
        Ok(())
    }

    fn resolve(&self, handle: ComponentHandle) -> SuitResult<&ComponentState<'a>> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.state.as_ref())
            .ok_or(SuitError::UnsupportedComponentId)
    }

    fn resolve_mut(&mut self, handle: ComponentHandle) -> SuitResult<&mut ComponentState<'a>> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.state.as_mut())
            .ok_or(SuitError::UnsupportedComponentId)
    }

    pub fn component_id(&self, handle: ComponentHandle) -> SuitResult<&'a [u8]> {
        Ok(self.resolve(handle)?.component_id)
    }

    /// Read component bytes at `offset`. The length is clamped to the bytes
    /// actually present; an offset past them is an unavailable payload.
    pub fn read<F: SuitFlash>(
        &self,
        flash: &F,
        handle: ComponentHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> SuitResult<usize> {
        let state = self.resolve(handle)?;
        let len = clamp_read(state.read_size, offset, buf.len())?;
        if len == 0 {
            return Ok(0);
        }

        match &state.backend {
            Backend::MemFlash { info } => {
                let start = info.run_address + offset;
                let src = flash
                    .mapped()
                    .get(start..start + len)
                    .ok_or(SuitError::OutOfBounds)?;
                buf[..len].copy_from_slice(src);
            }
            Backend::MemRam { buf: ram, .. } => {
                buf[..len].copy_from_slice(&ram[offset..offset + len]);
            }
            Backend::Candidate { record } => {
                let region = self
                    .memptr
                    .get(*record)?
                    .ok_or(SuitError::UnavailablePayload)?;
                let start = region.addr + offset;
                let src = flash
                    .mapped()
                    .get(start..start + len)
                    .ok_or(SuitError::OutOfBounds)?;
                buf[..len].copy_from_slice(src);
            }
        }
        Ok(len)
    }

    /// Write `data` at `offset`. Dry runs only track the resulting size;
    /// real writes reconcile the dry-run size with the committed one.
    pub fn write<F: SuitFlash>(
        &mut self,
        flash: &mut F,
        handle: ComponentHandle,
        mode: WriteMode,
        offset: usize,
        data: &[u8],
    ) -> SuitResult<()> {
        let state = self.resolve_mut(handle)?;

        let size = match &state.backend {
            Backend::MemFlash { info } | Backend::MemRam { info, .. } => info.size,
            Backend::Candidate { .. } => return Err(SuitError::UnsupportedCommand),
        };
        let end = offset
            .checked_add(data.len())
            .ok_or(SuitError::SizeLimit)?;
        if end > size {
            return Err(SuitError::SizeLimit);
        }

        if mode == WriteMode::DryRun {
            state.dry_read_size = state.dry_read_size.max(end);
            return Ok(());
        }

        match &mut state.backend {
            Backend::MemFlash { info } => {
                // Flash words start on write-block boundaries; the sink
                // splices an unaligned tail, but a misaligned start would
                // clobber bytes before the component.
                if offset % flash.write_block_size() != 0 {
                    return Err(SuitError::InvalidParameter);
                }
                let mut sink = FlashSink::new(flash, info.run_address, info.size)?;
                sink.seek(offset)?;
                stream_memptr(data, &mut sink)?;
            }
            Backend::MemRam { buf, .. } => {
                buf[offset..end].copy_from_slice(data);
            }
            Backend::Candidate { .. } => unreachable!(),
        }
        state.read_size = state.read_size.max(end);
        state.dry_read_size = state.read_size;
        Ok(())
    }

    /// Location of the component's bytes in device address space.
    pub fn read_address(&self, handle: ComponentHandle) -> SuitResult<MemRegion> {
        let state = self.resolve(handle)?;
        match &state.backend {
            Backend::MemFlash { info } => Ok(MemRegion::new(info.run_address, info.size)),
            Backend::MemRam { .. } => Err(SuitError::UnsupportedCommand),
            Backend::Candidate { record } => self
                .memptr
                .get(*record)?
                .ok_or(SuitError::UnavailablePayload),
        }
    }

    /// Whether manifests of `class_id` may touch this component at all.
    fn class_may_access(mci: &Mci, class_id: &ManifestClassId, backend: &Backend) -> bool {
        match backend {
            Backend::MemFlash { info } | Backend::MemRam { info, .. } => mci
                .validate_memory_access_rights(class_id, info.run_address, info.size)
                .is_ok(),
            Backend::Candidate { .. } => true,
        }
    }

    /// Vendor identity condition: `vid` must be the vendor of a manifest
    /// class entitled to this component.
    pub fn check_vid(
        &self,
        handle: ComponentHandle,
        mci: &Mci,
        vid: &Uuid,
    ) -> SuitResult<()> {
        let state = self.resolve(handle)?;
        let mut ids = [UNSPECIFIED_CLASS_ID; MAX_CLASS_IDS];
        let count = mci.supported_class_ids(&mut ids)?;
        for class_id in &ids[..count] {
            if Self::class_may_access(mci, class_id, &state.backend)
                && mci.vendor_id_for_class(class_id)? == *vid
            {
                return Ok(());
            }
        }
        log::info!("vendor id condition failed");
        Err(SuitError::FailCondition)
    }

    /// Class identity condition: `cid` must name a manifest class entitled
    /// to this component.
    pub fn check_cid(
        &self,
        handle: ComponentHandle,
        mci: &Mci,
        cid: &ManifestClassId,
    ) -> SuitResult<()> {
        let state = self.resolve(handle)?;
        let mut ids = [UNSPECIFIED_CLASS_ID; MAX_CLASS_IDS];
        let count = mci.supported_class_ids(&mut ids)?;
        for class_id in &ids[..count] {
            if Self::class_may_access(mci, class_id, &state.backend) && class_id == cid {
                return Ok(());
            }
        }
        log::info!("class id condition failed");
        Err(SuitError::FailCondition)
    }

    /// Select image slot `_slot` for the component. No backend carries
    /// multiple slots, so every live handle reports the command as
    /// unsupported.
    pub fn check_slot(&self, handle: ComponentHandle, _slot: usize) -> SuitResult<()> {
        self.resolve(handle)?;
        Err(SuitError::UnsupportedCommand)
    }

    /// Copy a payload carried inside the envelope into the component. The
    /// bytes land at offset zero; candidate components take staged regions
    /// through [`ComponentTable::stage_candidate`] instead.
    pub fn fetch_integrated<F: SuitFlash>(
        &mut self,
        flash: &mut F,
        handle: ComponentHandle,
        mode: WriteMode,
        payload: &[u8],
    ) -> SuitResult<()> {
        self.write(flash, handle, mode, 0, payload)
    }

    /// Bind a staged payload region to a candidate component.
    pub fn stage_candidate(
        &mut self,
        handle: ComponentHandle,
        region: MemRegion,
    ) -> SuitResult<()> {
        let record = match self.resolve(handle)?.backend {
            Backend::Candidate { record } => record,
            _ => return Err(SuitError::UnsupportedCommand),
        };
        self.memptr.store(record, region)?;
        let state = self.resolve_mut(handle)?;
        state.read_size = region.size;
        state.dry_read_size = region.size;
        Ok(())
    }

    /// Start the component's processor, subject to the manifest class's
    /// start rights.
    pub fn invoke(
        &self,
        handle: ComponentHandle,
        mci: &Mci,
        class_id: &ManifestClassId,
    ) -> SuitResult<()> {
        let state = self.resolve(handle)?;
        match &state.backend {
            Backend::MemFlash { info } | Backend::MemRam { info, .. } => {
                mci.validate_processor_start_rights(class_id, info.cpu_id)?;
                log::info!(
                    "invoking cpu {} at {:#010x}",
                    info.cpu_id,
                    info.run_address
                );
                Ok(())
            }
            Backend::Candidate { .. } => Err(SuitError::UnsupportedCommand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suit_cbor::Encoder;
    use suit_flash::RamFlash;
    use suit_mci::sample_policy;

    fn wrapped_tstr(enc: &mut Encoder<'_>, text: &[u8]) {
        let mut tmp = [0u8; 32];
        let len = {
            let mut inner = Encoder::new(&mut tmp);
            inner.tstr(text).unwrap();
            inner.position()
        };
        enc.bstr(&tmp[..len]).unwrap();
    }

    fn wrapped_uint(enc: &mut Encoder<'_>, value: u64) {
        let mut tmp = [0u8; 16];
        let len = {
            let mut inner = Encoder::new(&mut tmp);
            inner.uint(value).unwrap();
            inner.position()
        };
        enc.bstr(&tmp[..len]).unwrap();
    }

    fn mem_id(buf: &mut [u8], cpu_id: u64, addr: u64, size: u64) -> usize {
        let mut enc = Encoder::new(buf);
        enc.array(4).unwrap();
        wrapped_tstr(&mut enc, b"MEM");
        wrapped_uint(&mut enc, cpu_id);
        wrapped_uint(&mut enc, addr);
        wrapped_uint(&mut enc, size);
        enc.position()
    }

    fn cand_img_id(buf: &mut [u8], number: u64) -> usize {
        let mut enc = Encoder::new(buf);
        enc.array(2).unwrap();
        wrapped_tstr(&mut enc, b"CAND_IMG");
        wrapped_uint(&mut enc, number);
        enc.position()
    }

    fn instld_id(buf: &mut [u8]) -> usize {
        let mut enc = Encoder::new(buf);
        enc.array(2).unwrap();
        wrapped_tstr(&mut enc, b"INSTLD_MFST");
        enc.bstr(&[0x5A; 16]).unwrap();
        enc.position()
    }

    #[test]
    fn test_released_handle_is_unusable_and_slot_reused() {
        let flash: RamFlash<256> = RamFlash::new(4, 16);
        let mut id = [0u8; 64];
        let len = mem_id(&mut id, 2, 0x40, 0x20);
        let id = &id[..len];

        let mut table = ComponentTable::new(MemBackend::Flash);
        let handle = table.create(id).unwrap();
        table.release(handle).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(
            table.read(&flash, handle, 0, &mut buf),
            Err(SuitError::UnsupportedComponentId)
        );
        assert_eq!(table.release(handle), Err(SuitError::UnsupportedComponentId));

        // The slot is reusable, and the stale handle still does not alias
        // the new occupant.
        let fresh = table.create(id).unwrap();
        assert_ne!(fresh, handle);
        assert!(table.read(&flash, fresh, 0, &mut buf).is_ok());
        assert_eq!(
            table.read(&flash, handle, 0, &mut buf),
            Err(SuitError::UnsupportedComponentId)
        );
    }

    #[test]
    fn test_table_exhaustion() {
        let mut id = [0u8; 64];
        let len = mem_id(&mut id, 2, 0x40, 0x20);
        let id = &id[..len];
        let mut table = ComponentTable::new(MemBackend::Flash);
        for _ in 0..MAX_COMPONENTS {
            table.create(id).unwrap();
        }
        assert_eq!(table.create(id), Err(SuitError::NoResources));
    }

    #[test]
    fn test_unsupported_component_type() {
        let mut id = [0u8; 64];
        let len = instld_id(&mut id);
        let mut table = ComponentTable::new(MemBackend::Flash);
        assert_eq!(
            table.create(&id[..len]),
            Err(SuitError::UnsupportedComponentId)
        );
    }

    #[test]
    fn test_dry_run_then_real_write_reconciles_sizes() {
        let mut flash: RamFlash<256> = RamFlash::new(4, 16);
        let mut id = [0u8; 64];
        let len = mem_id(&mut id, 2, 0, 0x80);
        let id = &id[..len];

        let mut table = ComponentTable::new(MemBackend::RamBuf);
        let handle = table.create(id).unwrap();

        table
            .write(&mut flash, handle, WriteMode::DryRun, 0, &[0xAA; 40])
            .unwrap();
        // The dry run produced no readable bytes.
        let mut buf = [0u8; 8];
        assert_eq!(table.read(&flash, handle, 0, &mut buf), Ok(0));

        table
            .write(&mut flash, handle, WriteMode::Real, 0, &[0xAA; 40])
            .unwrap();
        assert_eq!(table.read(&flash, handle, 0, &mut buf), Ok(8));
        assert_eq!(buf, [0xAA; 8]);
        // A real write reconciles the two size counters.
        assert_eq!(table.read(&flash, handle, 40, &mut buf), Ok(0));
        table
            .write(&mut flash, handle, WriteMode::DryRun, 40, &[0xBB; 8])
            .unwrap();
        assert_eq!(table.read(&flash, handle, 40, &mut buf), Ok(0));
    }

    #[test]
    fn test_read_clamp_semantics() {
        let mut flash: RamFlash<256> = RamFlash::new(4, 16);
        let mut id = [0u8; 64];
        let len = mem_id(&mut id, 2, 0, 0x80);
        let id = &id[..len];

        let mut table = ComponentTable::new(MemBackend::RamBuf);
        let handle = table.create(id).unwrap();
        table
            .write(&mut flash, handle, WriteMode::Real, 0, &[7; 10])
            .unwrap();

        let mut buf = [0u8; 16];
        // Clamped to the written extent.
        assert_eq!(table.read(&flash, handle, 4, &mut buf), Ok(6));
        // Reading exactly at the extent returns zero bytes.
        assert_eq!(table.read(&flash, handle, 10, &mut buf), Ok(0));
        // Past the extent is unavailable.
        assert_eq!(
            table.read(&flash, handle, 11, &mut buf),
            Err(SuitError::UnavailablePayload)
        );
    }

    #[test]
    fn test_mem_flash_write_alignment_and_bounds() {
        let mut flash: RamFlash<256> = RamFlash::new(4, 16);
        let mut id = [0u8; 64];
        let len = mem_id(&mut id, 2, 0x40, 0x20);
        let id = &id[..len];

        let mut table = ComponentTable::new(MemBackend::Flash);
        let handle = table.create(id).unwrap();

        assert_eq!(
            table.write(&mut flash, handle, WriteMode::Real, 2, &[1, 2]),
            Err(SuitError::InvalidParameter)
        );
        assert_eq!(
            table.write(&mut flash, handle, WriteMode::Real, 0x1C, &[0; 8]),
            Err(SuitError::SizeLimit)
        );

        table
            .write(&mut flash, handle, WriteMode::Real, 4, &[1, 2, 3, 4, 5])
            .unwrap();
        assert_eq!(&flash.mapped()[0x44..0x49], &[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 5];
        assert_eq!(table.read(&flash, handle, 4, &mut buf), Ok(5));
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_candidate_stage_and_read() {
        let mut flash: RamFlash<256> = RamFlash::new(4, 16);
        flash.program(0x80, &[0xC3; 0x10]);
        let mut id = [0u8; 64];
        let len = cand_img_id(&mut id, 0);
        let id = &id[..len];

        let mut table = ComponentTable::new(MemBackend::Flash);
        let handle = table.create(id).unwrap();

        // Nothing staged yet.
        let mut buf = [0u8; 4];
        assert_eq!(table.read_address(handle), Err(SuitError::UnavailablePayload));
        assert_eq!(table.read(&flash, handle, 0, &mut buf), Ok(0));

        let region = MemRegion::new(0x80, 0x10);
        table.stage_candidate(handle, region).unwrap();
        assert_eq!(table.read_address(handle), Ok(region));
        assert_eq!(table.read(&flash, handle, 0, &mut buf), Ok(4));
        assert_eq!(buf, [0xC3; 4]);

        // Writes do not apply to candidate references.
        assert_eq!(
            table.write(&mut flash, handle, WriteMode::Real, 0, &[0]),
            Err(SuitError::UnsupportedCommand)
        );
    }

    #[test]
    fn test_identity_checks_follow_component_access_rights() {
        let mut id = [0u8; 64];
        let len = mem_id(&mut id, 2, 0x40, 0x20);
        let id = &id[..len];
        let mut cand = [0u8; 64];
        let cand_len = cand_img_id(&mut cand, 0);

        let mut table = ComponentTable::new(MemBackend::Flash);
        let handle = table.create(id).unwrap();
        let mci = &sample_policy::MCI;

        assert!(table.check_vid(handle, mci, &suit_mci::VENDOR_ID).is_ok());
        assert_eq!(
            table.check_vid(handle, mci, &Uuid::new([9; 16])),
            Err(SuitError::FailCondition)
        );

        // Application manifests hold memory access rights, the root does
        // not, and unknown classes never match.
        assert!(table
            .check_cid(handle, mci, &sample_policy::APP_CLASS_ID)
            .is_ok());
        assert_eq!(
            table.check_cid(handle, mci, &sample_policy::ROOT_CLASS_ID),
            Err(SuitError::FailCondition)
        );
        assert_eq!(
            table.check_cid(handle, mci, &Uuid::new([9; 16])),
            Err(SuitError::FailCondition)
        );

        // Candidate components are not memory-gated.
        let cand_handle = table.create(&cand[..cand_len]).unwrap();
        assert!(table
            .check_cid(cand_handle, mci, &sample_policy::ROOT_CLASS_ID)
            .is_ok());

        table.release(handle).unwrap();
        assert_eq!(
            table.check_cid(handle, mci, &sample_policy::APP_CLASS_ID),
            Err(SuitError::UnsupportedComponentId)
        );
    }

    #[test]
    fn test_fetch_integrated_lands_at_offset_zero() {
        let mut flash: RamFlash<256> = RamFlash::new(4, 16);
        let mut id = [0u8; 64];
        let len = mem_id(&mut id, 2, 0, 0x80);
        let id = &id[..len];

        let mut table = ComponentTable::new(MemBackend::RamBuf);
        let handle = table.create(id).unwrap();

        table
            .fetch_integrated(&mut flash, handle, WriteMode::Real, &[0xE1; 12])
            .unwrap();
        let mut buf = [0u8; 12];
        assert_eq!(table.read(&flash, handle, 0, &mut buf), Ok(12));
        assert_eq!(buf, [0xE1; 12]);

        assert_eq!(table.check_slot(handle, 0), Err(SuitError::UnsupportedCommand));
    }

    #[test]
    fn test_invoke_checks_processor_rights() {
        let mut id = [0u8; 64];
        let len = mem_id(&mut id, sample_policy::PROCESSOR_APPLICATION as u64, 0x40, 0x20);
        let id = &id[..len];

        let mut table = ComponentTable::new(MemBackend::Flash);
        let handle = table.create(id).unwrap();

        assert!(table
            .invoke(handle, &sample_policy::MCI, &sample_policy::APP_CLASS_ID)
            .is_ok());
        assert_eq!(
            table.invoke(handle, &sample_policy::MCI, &sample_policy::ROOT_CLASS_ID),
            Err(SuitError::FailCondition)
        );
    }
}
