// Licensed under the Apache-2.0 license

//! Boot-time orchestration: decide between applying a staged update and
//! invoking the installed manifests.
//!
//! An invalid update candidate is never fatal; it is discarded and the
//! device boots whatever is already installed. The boot path is best-effort
//! per manifest: one failing manifest triggers emergency recovery for that
//! manifest only, the others still boot.

#![cfg_attr(target_arch = "riscv32", no_std)]

use suit_flash::SuitFlash;
use suit_mci::{Mci, UNSPECIFIED_CLASS_ID};
use suit_platform::DigestCache;
use suit_storage::{envelope, SuitStorage, MAX_SUPPORTED_CLASS_IDS, MAX_UPDATE_REGIONS};
use suit_types::{
    decode_manifest_class_id, ManifestClassId, MemRegion, SuitError, SuitResult,
};

/// Manifest command sequences, in the order the orchestrator drives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSequence {
    Parse,
    Validate,
    Load,
    Invoke,
    Install,
}

/// Executes manifest command sequences against the platform.
///
/// The orchestrator owns sequencing and failure policy; the processor owns
/// the manifest interpretation itself.
pub trait ManifestProcessor {
    fn run_sequence(
        &mut self,
        class_id: &ManifestClassId,
        envelope: &[u8],
        sequence: ManifestSequence,
    ) -> SuitResult<()>;

    /// Semantic applicability of a staged update to this device. The
    /// default accepts everything.
    fn check_applicability(
        &mut self,
        _class_id: &ManifestClassId,
        _envelope: &[u8],
    ) -> SuitResult<()> {
        Ok(())
    }
}

/// Fallback invoked when a manifest fails on the boot path.
pub trait RecoveryHandler {
    fn emergency_recovery(&mut self, class_id: &ManifestClassId, error: SuitError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// A staged update was validated and installed; the caller reboots.
    UpdateInstalled,
    /// Boot path taken; `invoked` manifests completed all sequences.
    Booted { invoked: usize },
}

pub struct Orchestrator<P, R> {
    mci: &'static Mci,
    processor: P,
    recovery: R,
    digest_cache: DigestCache,
}

impl<P: ManifestProcessor, R: RecoveryHandler> Orchestrator<P, R> {
    pub fn new(mci: &'static Mci, processor: P, recovery: R) -> Orchestrator<P, R> {
        Orchestrator {
            mci,
            processor,
            recovery,
            digest_cache: DigestCache::new(),
        }
    }

    pub fn digest_cache_mut(&mut self) -> &mut DigestCache {
        &mut self.digest_cache
    }

    /// One full boot decision. `scratch` must hold the largest envelope the
    /// device accepts; the staged envelope is copied there before any flash
    /// mutation.
    pub fn run<F: SuitFlash>(
        &mut self,
        flash: &mut F,
        storage: &mut SuitStorage,
        scratch: &mut [u8],
    ) -> SuitResult<BootOutcome> {
        // Digest pointers cached before this boot are stale; drop them
        // before anything consults the cache.
        self.digest_cache.unlock();
        self.digest_cache.remove_all()?;
        self.digest_cache.lock();

        let mut supported = [UNSPECIFIED_CLASS_ID; MAX_SUPPORTED_CLASS_IDS];
        let count = self.mci.supported_class_ids(&mut supported)?;
        storage.init(flash, &supported[..count])?;

        if self.process_update(flash, storage, scratch)? {
            return Ok(BootOutcome::UpdateInstalled);
        }

        let invoked = self.boot_all(flash, storage)?;
        Ok(BootOutcome::Booted { invoked })
    }

    /// Returns `Ok(true)` when an update was applied. Any candidate, valid
    /// or not, is consumed: the slot is cleared before returning.
    fn process_update<F: SuitFlash>(
        &mut self,
        flash: &mut F,
        storage: &SuitStorage,
        scratch: &mut [u8],
    ) -> SuitResult<bool> {
        let mut regions = [MemRegion::default(); MAX_UPDATE_REGIONS];
        match storage.candidate_get(flash, &mut regions) {
            Ok(_) => {}
            Err(SuitError::NotFound) => return Ok(false),
            Err(err) => return Err(err),
        }

        let result = self.apply_update(flash, storage, regions[0], scratch);
        storage.candidate_clear(flash)?;
        match result {
            Ok(()) => {
                log::info!("update candidate installed");
                Ok(true)
            }
            Err(err) => {
                log::warn!("update candidate rejected: {err:?}, booting installed firmware");
                Ok(false)
            }
        }
    }

    fn apply_update<F: SuitFlash>(
        &mut self,
        flash: &mut F,
        storage: &SuitStorage,
        region: MemRegion,
        scratch: &mut [u8],
    ) -> SuitResult<()> {
        let end = region
            .addr
            .checked_add(region.size)
            .ok_or(SuitError::OutOfBounds)?;
        let staged = flash
            .mapped()
            .get(region.addr..end)
            .ok_or(SuitError::OutOfBounds)?;
        let (severed, envelope_len) = envelope::decode_severed(staged)?;
        let class_id = decode_manifest_class_id(severed.component_id)?;
        self.mci.validate_class_id(&class_id)?;

        if envelope_len > scratch.len() {
            return Err(SuitError::SizeLimit);
        }
        scratch[..envelope_len].copy_from_slice(&staged[..envelope_len]);
        let staged = &scratch[..envelope_len];

        self.processor
            .run_sequence(&class_id, staged, ManifestSequence::Parse)?;
        self.processor.check_applicability(&class_id, staged)?;
        self.processor
            .run_sequence(&class_id, staged, ManifestSequence::Install)?;

        storage.install_envelope(flash, &class_id, staged)
    }

    fn boot_all<F: SuitFlash>(&mut self, flash: &F, storage: &SuitStorage) -> SuitResult<usize> {
        let mut order = [UNSPECIFIED_CLASS_ID; MAX_SUPPORTED_CLASS_IDS];
        let count = self.mci.invoke_order(&mut order)?;

        let mut invoked = 0;
        for class_id in &order[..count] {
            match self.boot_one(flash, storage, class_id) {
                Ok(()) => invoked += 1,
                Err(err) => {
                    log::error!("manifest failed to boot: {err:?}");
                    self.recovery.emergency_recovery(class_id, err);
                }
            }
        }
        Ok(invoked)
    }

    fn boot_one<F: SuitFlash>(
        &mut self,
        flash: &F,
        storage: &SuitStorage,
        class_id: &ManifestClassId,
    ) -> SuitResult<()> {
        let installed = storage.installed_envelope_get(flash, class_id)?;

        self.processor
            .run_sequence(class_id, installed, ManifestSequence::Parse)?;
        self.processor
            .run_sequence(class_id, installed, ManifestSequence::Validate)?;
        match self
            .processor
            .run_sequence(class_id, installed, ManifestSequence::Load)
        {
            // Manifests without a load sequence boot in place.
            Err(SuitError::UnavailableCommandSeq) => {
                log::debug!("manifest has no load sequence, skipping");
            }
            other => other?,
        }
        self.processor
            .run_sequence(class_id, installed, ManifestSequence::Invoke)
    }
}
