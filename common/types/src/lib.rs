// Licensed under the Apache-2.0 license

//! Shared types for the SUIT update/boot engine: the error taxonomy, UUID and
//! manifest identity types, semantic versions, manifest roles, and the
//! component-id decode utilities.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod component;
pub mod error;
pub mod mem;
pub mod metadata;
pub mod uuid;

pub use component::{
    decode_component_id, decode_component_number, decode_component_type,
    decode_manifest_class_id, ComponentType, MemComponentInfo,
};
pub use error::{SuitError, SuitResult};
pub use mem::MemRegion;
pub use metadata::{ManifestRole, ManifestVersion, ReleaseType};
pub use uuid::{ManifestClassId, Uuid};
