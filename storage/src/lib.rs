// Licensed under the Apache-2.0 license

//! Persistent SUIT storage: the erase-block-aligned flash layout holding the
//! update candidate record, two configuration slots, and N installed
//! envelope slots.
//!
//! Every mutation erases a whole region and rewrites it, so a power loss
//! mid-write leaves either the previous content or a blank region. Reads go
//! through the memory-mapped flash view and return borrowed slices, not
//! copies.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod envelope;
pub mod mpi;
pub mod update;
mod writer;

pub use mpi::{MpiTable, MAX_MPI_ENTRIES};
pub use update::{UpdateCandidateInfo, MAX_UPDATE_REGIONS, UPDATE_MAGIC_AVAILABLE_CBOR};

use suit_flash::{SuitFlash, MAX_WRITE_BLOCK};
use suit_types::{decode_manifest_class_id, ManifestClassId, MemRegion, SuitError, SuitResult};
use writer::SlotWriter;
use zerocopy::IntoBytes;

pub const MAX_ENVELOPE_SLOTS: usize = 8;
pub const MAX_SUPPORTED_CLASS_IDS: usize = 8;

/// Reserved size of each configuration record.
const CONFIG_RECORD_SIZE: usize = 64;

/// Scratch space for the padded update-candidate record.
const UPDATE_RECORD_BUF: usize = 128;

const fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Geometry of the storage area within the flash device.
#[derive(Debug, Clone, Copy)]
pub struct StorageLayout {
    /// Offset of the storage area; must be erase-block aligned.
    pub base: usize,
    pub erase_block_size: usize,
    /// Bytes reserved per envelope slot; a multiple of the erase block.
    pub envelope_slot_size: usize,
    pub envelope_count: usize,
}

impl StorageLayout {
    fn update_block_len(&self) -> usize {
        align_up(
            core::mem::size_of::<UpdateCandidateInfo>(),
            self.erase_block_size,
        )
    }

    fn config_block_len(&self) -> usize {
        align_up(CONFIG_RECORD_SIZE, self.erase_block_size)
    }

    pub fn update_offset(&self) -> usize {
        self.base
    }

    pub fn config_offset(&self) -> usize {
        self.base + self.update_block_len()
    }

    pub fn config_backup_offset(&self) -> usize {
        self.config_offset() + self.config_block_len()
    }

    pub fn envelope_offset(&self, index: usize) -> usize {
        self.config_backup_offset() + self.config_block_len() + index * self.envelope_slot_size
    }

    pub fn total_size(&self) -> usize {
        self.envelope_offset(self.envelope_count) - self.base
    }
}

pub struct SuitStorage {
    layout: StorageLayout,
    supported: [ManifestClassId; MAX_SUPPORTED_CLASS_IDS],
    supported_len: usize,
}

impl SuitStorage {
    pub fn new(layout: StorageLayout) -> SuitResult<SuitStorage> {
        if layout.erase_block_size == 0
            || layout.base % layout.erase_block_size != 0
            || layout.envelope_slot_size == 0
            || layout.envelope_slot_size % layout.erase_block_size != 0
            || layout.envelope_count == 0
            || layout.envelope_count > MAX_ENVELOPE_SLOTS
        {
            return Err(SuitError::InvalidParameter);
        }
        Ok(SuitStorage {
            layout,
            supported: [ManifestClassId::new([0; 16]); MAX_SUPPORTED_CLASS_IDS],
            supported_len: 0,
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Bind the supported manifest class list and scrub slots holding
    /// envelopes whose class is no longer supported.
    pub fn init<F: SuitFlash>(
        &mut self,
        flash: &mut F,
        supported: &[ManifestClassId],
    ) -> SuitResult<()> {
        if supported.is_empty() || supported.len() > MAX_SUPPORTED_CLASS_IDS {
            return Err(SuitError::InvalidParameter);
        }
        if self.layout.base + self.layout.total_size() > flash.size() {
            return Err(SuitError::SizeLimit);
        }
        if flash.write_block_size() > MAX_WRITE_BLOCK
            || self.layout.erase_block_size % flash.erase_block_size() != 0
            || self.layout.erase_block_size % flash.write_block_size() != 0
        {
            return Err(SuitError::InvalidParameter);
        }

        self.supported[..supported.len()].copy_from_slice(supported);
        self.supported_len = supported.len();

        log::debug!("suit storage: supporting {} manifest classes", supported.len());
        self.erase_unsupported_envelopes(flash)
    }

    fn is_supported(&self, id: &ManifestClassId) -> bool {
        self.supported[..self.supported_len].contains(id)
    }

    fn slot_bytes<'f, F: SuitFlash>(&self, flash: &'f F, index: usize) -> SuitResult<&'f [u8]> {
        let offset = self.layout.envelope_offset(index);
        flash
            .mapped()
            .get(offset..offset + self.layout.envelope_slot_size)
            .ok_or(SuitError::OutOfBounds)
    }

    /// Class id stored in a slot, if the slot holds a decodable envelope.
    fn slot_class_id<F: SuitFlash>(&self, flash: &F, index: usize) -> Option<ManifestClassId> {
        let slot = self.slot_bytes(flash, index).ok()?;
        let hdr = envelope::decode_envelope_header(slot).ok()?;
        ManifestClassId::from_slice(hdr.class_id_bytes().ok()?).ok()
    }

    /// Find the slot currently holding `id` and a slot available for reuse.
    fn find_manifest_index<F: SuitFlash>(
        &self,
        flash: &F,
        id: &ManifestClassId,
    ) -> SuitResult<(Option<usize>, Option<usize>)> {
        if !self.is_supported(id) {
            return Err(SuitError::InvalidParameter);
        }

        let mut current = None;
        let mut free = None;
        for index in 0..self.layout.envelope_count {
            match self.slot_class_id(flash, index) {
                Some(class_id) if self.is_supported(&class_id) => {
                    if class_id == *id {
                        current = Some(index);
                        break;
                    }
                }
                // Undecodable slots and unsupported classes are reusable.
                _ => {
                    if free.is_none() {
                        free = Some(index);
                    }
                }
            }
        }
        Ok((current, free))
    }

    fn erase_unsupported_envelopes<F: SuitFlash>(&self, flash: &mut F) -> SuitResult<()> {
        for index in 0..self.layout.envelope_count {
            let class_id = match self.slot_class_id(&*flash, index) {
                Some(id) => id,
                None => continue,
            };
            if !self.is_supported(&class_id) {
                log::warn!("suit storage: erasing unsupported envelope at slot {index}");
                flash.erase(
                    self.layout.envelope_offset(index),
                    self.layout.envelope_slot_size,
                )?;
            }
        }
        Ok(())
    }

    /// View of the installed envelope for `id`, trimmed to its decoded
    /// length. The envelope is re-validated by parsing before it is handed
    /// out.
    pub fn installed_envelope_get<'f, F: SuitFlash>(
        &self,
        flash: &'f F,
        id: &ManifestClassId,
    ) -> SuitResult<&'f [u8]> {
        let (current, _) = self.find_manifest_index(flash, id)?;
        let index = current.ok_or(SuitError::NotFound)?;

        let slot = self.slot_bytes(flash, index)?;
        let hdr = envelope::decode_envelope_header(slot)?;
        let (_, envelope_len) = envelope::decode_severed(hdr.envelope)?;
        log::debug!("suit storage: envelope for requested class found at slot {index}");
        Ok(&hdr.envelope[..envelope_len])
    }

    /// Re-encode a severed envelope into an erase-block-aligned slot.
    ///
    /// The slot already holding this class is reused; otherwise the first
    /// reusable slot is taken. The stored class id offset points at the
    /// 16-byte class id inside the re-encoded envelope.
    pub fn install_envelope<F: SuitFlash>(
        &self,
        flash: &mut F,
        id: &ManifestClassId,
        raw_envelope: &[u8],
    ) -> SuitResult<()> {
        if raw_envelope.is_empty() {
            return Err(SuitError::InvalidParameter);
        }

        let (current, free) = self.find_manifest_index(&*flash, id)?;
        let index = current.or(free).ok_or(SuitError::NotFound)?;

        let (severed, _) = envelope::decode_severed(raw_envelope)?;
        let class_id = decode_manifest_class_id(severed.component_id)?;
        if class_id != *id {
            log::error!("suit storage: envelope class id does not match the requested class");
            return Err(SuitError::InvalidParameter);
        }

        let auth = severed.authentication_wrapper;
        let manifest = severed.manifest;
        let encoding_overhead = envelope::ENVELOPE_TAG_PREFIX.len()
            + envelope::kv_header_len(envelope::AUTHENTICATION_WRAPPER_KEY, auth.len())?
            + envelope::kv_header_len(envelope::MANIFEST_KEY, manifest.len())?;

        let class_id_offset = encoding_overhead
            + severed.component_id_offset
            + envelope::class_id_content_offset(severed.component_id)?
            + auth.len();
        let envelope_size = encoding_overhead + auth.len() + manifest.len();

        if envelope::ENCODED_HEADER_LEN_MAX + envelope_size > self.layout.envelope_slot_size {
            log::error!("suit storage: envelope of {envelope_size} bytes does not fit a slot");
            return Err(SuitError::SizeLimit);
        }

        let mut hdr_buf = [0u8; envelope::ENCODED_HEADER_LEN_MAX];
        let hdr_len = envelope::encode_envelope_header(class_id_offset, envelope_size, &mut hdr_buf)?;

        let mut writer = SlotWriter::new(
            flash,
            self.layout.envelope_offset(index),
            self.layout.envelope_slot_size,
        )?;
        writer.append(&hdr_buf[..hdr_len])?;

        let mut kv_buf = [0u8; 8];
        let kv_len =
            envelope::encode_kv_header(envelope::AUTHENTICATION_WRAPPER_KEY, auth.len(), &mut kv_buf)?;
        writer.append(&kv_buf[..kv_len])?;
        writer.append(auth)?;

        let kv_len = envelope::encode_kv_header(envelope::MANIFEST_KEY, manifest.len(), &mut kv_buf)?;
        writer.append(&kv_buf[..kv_len])?;
        writer.append(manifest)?;
        writer.flush()?;

        log::info!("suit storage: envelope saved at slot {index}");
        Ok(())
    }

    /// Staged update candidate regions, subject to the validity gate.
    pub fn candidate_get<F: SuitFlash>(
        &self,
        flash: &F,
        out: &mut [MemRegion],
    ) -> SuitResult<usize> {
        let offset = self.layout.update_offset();
        let bytes = flash
            .mapped()
            .get(offset..offset + core::mem::size_of::<UpdateCandidateInfo>())
            .ok_or(SuitError::OutOfBounds)?;
        UpdateCandidateInfo::decode(bytes)?.regions(out)
    }

    /// Stage a new update candidate: erase the whole record region, then
    /// write a freshly built record.
    pub fn candidate_set<F: SuitFlash>(
        &self,
        flash: &mut F,
        regions: &[MemRegion],
    ) -> SuitResult<()> {
        let info = UpdateCandidateInfo::from_regions(regions)?;

        let record = info.as_bytes();
        let wbs = flash.write_block_size();
        let padded_len = align_up(record.len(), wbs);
        let mut buf = [0xFFu8; UPDATE_RECORD_BUF];
        if padded_len > buf.len() {
            return Err(SuitError::SizeLimit);
        }
        buf[..record.len()].copy_from_slice(record);

        flash.erase(self.layout.update_offset(), self.layout.update_block_len())?;
        flash.write(self.layout.update_offset(), &buf[..padded_len])?;
        Ok(())
    }

    /// Clear the candidate; the record region never holds partial updates.
    pub fn candidate_clear<F: SuitFlash>(&self, flash: &mut F) -> SuitResult<()> {
        self.candidate_set(flash, &[])
    }
}
