// Licensed under the Apache-2.0 license

//! Manifest Class Identity: the per-SoC policy layer mapping manifest class
//! UUIDs to trust and authorization rules.
//!
//! The policy is a static table of [`ManifestConfig`] entries. Every manifest
//! class has exactly one parent or none; the parent links form a tree rooted
//! at the single top-level manifest. The table is data, not code: access
//! rights and the boot invocation order are expressed as per-entry fields so
//! a different SoC ships a different table, not a different implementation.

#![cfg_attr(target_arch = "riscv32", no_std)]

use suit_types::{ManifestClassId, ManifestRole, SuitError, SuitResult, Uuid};

/// Vendor id: RFC4122 uuid5(uuid.NAMESPACE_DNS, 'nordicsemi.com').
pub const VENDOR_ID: Uuid = Uuid::new([
    0x76, 0x17, 0xda, 0xa5, 0x71, 0xfd, 0x5a, 0x85, 0x8f, 0x94, 0xe2, 0x8d, 0x73, 0x5c, 0xe9,
    0xf4,
]);

/// Class id for components not bound to any manifest class:
/// uuid5(vendor_id, 'unspecified_class').
pub const UNSPECIFIED_CLASS_ID: ManifestClassId = Uuid::new([
    0xca, 0xd8, 0x52, 0x3a, 0xf8, 0x29, 0x5a, 0x9a, 0xba, 0x85, 0x2e, 0xa0, 0xb2, 0xf5, 0x77,
    0xc9,
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowngradePreventionPolicy {
    Disabled,
    Enabled,
}

/// Per-class policy for platform-specific (SoC) component numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformComponentPolicy {
    Deny,
    /// Only the listed component numbers may be touched by this class.
    Allow(&'static [u32]),
}

/// One row of the manifest policy table.
#[derive(Debug, Clone, Copy)]
pub struct ManifestConfig {
    pub class_id: ManifestClassId,
    pub parent: Option<ManifestClassId>,
    pub role: ManifestRole,
    pub downgrade_prevention_policy: DowngradePreventionPolicy,
    /// A zero mask means signing is not required.
    pub signing_key_bits: u32,
    pub signing_key_mask: u32,
    /// Processor ids this class may start. The root manifest starts nothing
    /// directly; children do.
    pub startable_processors: &'static [u8],
    /// Whether this class may operate on memory ranges at all.
    pub memory_access: bool,
    pub platform_components: PlatformComponentPolicy,
    /// Whether the boot path invokes this class directly. Children of an
    /// invocable root are invoked transitively through it.
    pub invocable: bool,
}

pub struct Mci {
    configs: &'static [ManifestConfig],
}

impl Mci {
    pub const fn new(configs: &'static [ManifestConfig]) -> Mci {
        Mci { configs }
    }

    fn find(&self, class_id: &ManifestClassId) -> SuitResult<&ManifestConfig> {
        self.configs
            .iter()
            .find(|cfg| cfg.class_id == *class_id)
            .ok_or(SuitError::NotFound)
    }

    /// Copy the supported class ids into `out`; returns the count.
    pub fn supported_class_ids(&self, out: &mut [ManifestClassId]) -> SuitResult<usize> {
        if out.len() < self.configs.len() {
            return Err(SuitError::SizeLimit);
        }
        for (slot, cfg) in out.iter_mut().zip(self.configs.iter()) {
            *slot = cfg.class_id;
        }
        Ok(self.configs.len())
    }

    /// Class ids to invoke on the boot path, in table order.
    pub fn invoke_order(&self, out: &mut [ManifestClassId]) -> SuitResult<usize> {
        let mut count = 0;
        for cfg in self.configs.iter().filter(|cfg| cfg.invocable) {
            if count == out.len() {
                return Err(SuitError::SizeLimit);
            }
            out[count] = cfg.class_id;
            count += 1;
        }
        Ok(count)
    }

    pub fn downgrade_prevention_policy(
        &self,
        class_id: &ManifestClassId,
    ) -> SuitResult<DowngradePreventionPolicy> {
        Ok(self.find(class_id)?.downgrade_prevention_policy)
    }

    pub fn validate_class_id(&self, class_id: &ManifestClassId) -> SuitResult<()> {
        self.find(class_id).map(|_| ())
    }

    /// Masked compare of the signing key id against the class policy.
    pub fn validate_signing_key_id(
        &self,
        class_id: &ManifestClassId,
        key_id: u32,
    ) -> SuitResult<()> {
        let cfg = self.find(class_id)?;
        if (cfg.signing_key_bits & cfg.signing_key_mask) != (key_id & cfg.signing_key_mask) {
            return Err(SuitError::Authentication);
        }
        Ok(())
    }

    pub fn validate_processor_start_rights(
        &self,
        class_id: &ManifestClassId,
        processor_id: u8,
    ) -> SuitResult<()> {
        let cfg = self.find(class_id)?;
        if cfg.startable_processors.contains(&processor_id) {
            Ok(())
        } else {
            Err(SuitError::FailCondition)
        }
    }

    pub fn validate_memory_access_rights(
        &self,
        class_id: &ManifestClassId,
        address: usize,
        size: usize,
    ) -> SuitResult<()> {
        if address == 0 || size == 0 {
            return Err(SuitError::InvalidParameter);
        }
        let cfg = self.find(class_id)?;
        if cfg.memory_access {
            Ok(())
        } else {
            Err(SuitError::FailCondition)
        }
    }

    pub fn validate_platform_specific_component_rights(
        &self,
        class_id: &ManifestClassId,
        component_number: u32,
    ) -> SuitResult<()> {
        let cfg = self.find(class_id)?;
        match cfg.platform_components {
            PlatformComponentPolicy::Deny => Err(SuitError::FailCondition),
            PlatformComponentPolicy::Allow(numbers) => {
                if numbers.contains(&component_number) {
                    Ok(())
                } else {
                    Err(SuitError::FailCondition)
                }
            }
        }
    }

    /// Parent class of `child_class_id`; `None` for the root.
    pub fn manifest_parent(
        &self,
        child_class_id: &ManifestClassId,
    ) -> SuitResult<Option<ManifestClassId>> {
        Ok(self.find(child_class_id)?.parent)
    }

    /// Verify that `parent_class_id` is the configured parent of
    /// `child_class_id`.
    pub fn validate_parent_child(
        &self,
        parent_class_id: &ManifestClassId,
        child_class_id: &ManifestClassId,
    ) -> SuitResult<()> {
        match self.manifest_parent(child_class_id)? {
            Some(parent) if parent == *parent_class_id => Ok(()),
            _ => Err(SuitError::FailCondition),
        }
    }

    pub fn role(&self, class_id: &ManifestClassId) -> SuitResult<ManifestRole> {
        Ok(self.find(class_id)?.role)
    }

    pub fn vendor_id_for_class(&self, class_id: &ManifestClassId) -> SuitResult<Uuid> {
        self.find(class_id)?;
        Ok(VENDOR_ID)
    }
}

pub mod sample_policy {
    //! Reference policy table for a four-manifest topology: a single root
    //! manifest orchestrating application, radio, and secure-system
    //! manifests.

    use super::*;

    /// uuid5(vendor_id, 'sample_root')
    pub const ROOT_CLASS_ID: ManifestClassId = Uuid::new([
        0x3f, 0x6a, 0x3a, 0x4d, 0xcd, 0xfa, 0x58, 0xc5, 0xac, 0xce, 0xf9, 0xf5, 0x84, 0xc4,
        0x11, 0x24,
    ]);

    /// uuid5(vendor_id, 'sample_app')
    pub const APP_CLASS_ID: ManifestClassId = Uuid::new([
        0x08, 0xc1, 0xb5, 0x99, 0x55, 0xe8, 0x5f, 0xbc, 0x9e, 0x76, 0x7b, 0xc2, 0x9c, 0xe1,
        0xb0, 0x4d,
    ]);

    /// uuid5(vendor_id, 'sample_rad')
    pub const RAD_CLASS_ID: ManifestClassId = Uuid::new([
        0x81, 0x6a, 0xa0, 0xa0, 0xaf, 0x11, 0x5e, 0xf2, 0x85, 0x8a, 0xfe, 0xb6, 0x68, 0xb2,
        0xe9, 0xc9,
    ]);

    /// uuid5(vendor_id, 'sample_sec_sys')
    pub const SEC_SYS_CLASS_ID: ManifestClassId = Uuid::new([
        0x75, 0x81, 0x1f, 0x10, 0x09, 0x94, 0x57, 0x72, 0xad, 0xf7, 0x71, 0x88, 0xbc, 0x8c,
        0x5b, 0x73,
    ]);

    pub const PROCESSOR_APPLICATION: u8 = 2;
    pub const PROCESSOR_RADIOCORE: u8 = 3;
    pub const PROCESSOR_SYSCTRL: u8 = 12;

    pub const CONFIGS: &[ManifestConfig] = &[
        ManifestConfig {
            class_id: ROOT_CLASS_ID,
            parent: None,
            role: ManifestRole::AppRoot,
            downgrade_prevention_policy: DowngradePreventionPolicy::Disabled,
            signing_key_bits: 0,
            signing_key_mask: 0,
            // The root orchestrates; starting cpus and touching memory
            // directly are blocked for it.
            startable_processors: &[],
            memory_access: false,
            platform_components: PlatformComponentPolicy::Deny,
            invocable: true,
        },
        ManifestConfig {
            class_id: SEC_SYS_CLASS_ID,
            parent: Some(ROOT_CLASS_ID),
            role: ManifestRole::SecSysctrl,
            downgrade_prevention_policy: DowngradePreventionPolicy::Disabled,
            signing_key_bits: 0,
            signing_key_mask: 0,
            startable_processors: &[PROCESSOR_SYSCTRL],
            memory_access: true,
            platform_components: PlatformComponentPolicy::Allow(&[0, 1]),
            invocable: false,
        },
        ManifestConfig {
            class_id: APP_CLASS_ID,
            parent: Some(ROOT_CLASS_ID),
            role: ManifestRole::AppLocal1,
            downgrade_prevention_policy: DowngradePreventionPolicy::Disabled,
            signing_key_bits: 0,
            signing_key_mask: 0,
            startable_processors: &[PROCESSOR_APPLICATION],
            memory_access: true,
            platform_components: PlatformComponentPolicy::Deny,
            invocable: false,
        },
        ManifestConfig {
            class_id: RAD_CLASS_ID,
            parent: Some(ROOT_CLASS_ID),
            role: ManifestRole::RadLocal1,
            downgrade_prevention_policy: DowngradePreventionPolicy::Disabled,
            signing_key_bits: 0,
            signing_key_mask: 0,
            startable_processors: &[PROCESSOR_RADIOCORE],
            memory_access: true,
            platform_components: PlatformComponentPolicy::Deny,
            invocable: false,
        },
    ];

    pub const MCI: Mci = Mci::new(CONFIGS);
}
