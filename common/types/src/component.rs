// Licensed under the Apache-2.0 license

//! Component-id decode utilities.
//!
//! A component id is a CBOR array of byte strings. The first element wraps a
//! text string naming the component type; the remaining elements wrap
//! type-specific values. All decoders operate read-only on the caller's view
//! and fail closed on any structural mismatch.

use crate::error::{SuitError, SuitResult};
use crate::uuid::ManifestClassId;
use suit_cbor::Decoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    /// Memory-mapped component, downloadable and bootable.
    Mem,
    /// Staged manifest, awaiting installation.
    CandManifest,
    /// Staged image, awaiting installation.
    CandImg,
    /// Installed manifest, identified by a manifest class id.
    InstldManifest,
    /// SoC-specific component, handled outside this engine.
    SocSpec,
    /// Cache pool component.
    CachePool,
    Unsupported,
}

/// Typed fields of a MEM component id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemComponentInfo {
    pub cpu_id: u8,
    pub run_address: usize,
    pub size: usize,
}

fn inner_tstr<'a>(dec: &mut Decoder<'a>) -> SuitResult<&'a [u8]> {
    let wrapped = dec.bstr()?;
    let mut inner = Decoder::new(wrapped);
    let text = inner.tstr()?;
    if !inner.is_at_end() {
        return Err(SuitError::Decoding);
    }
    Ok(text)
}

fn inner_uint(dec: &mut Decoder<'_>) -> SuitResult<u64> {
    let wrapped = dec.bstr()?;
    let mut inner = Decoder::new(wrapped);
    let value = inner.uint()?;
    if !inner.is_at_end() {
        return Err(SuitError::Decoding);
    }
    Ok(value)
}

/// Decode the component type tag. An unknown tag is reported as
/// `UnsupportedComponentId`, distinct from malformed CBOR.
pub fn decode_component_type(component_id: &[u8]) -> SuitResult<ComponentType> {
    let mut dec = Decoder::new(component_id);
    if dec.array()? < 1 {
        return Err(SuitError::Decoding);
    }
    let tag = inner_tstr(&mut dec)?;

    match tag {
        b"MEM" => Ok(ComponentType::Mem),
        b"CAND_IMG" => Ok(ComponentType::CandImg),
        b"CAND_MFST" => Ok(ComponentType::CandManifest),
        b"INSTLD_MFST" => Ok(ComponentType::InstldManifest),
        b"SOC_SPEC" => Ok(ComponentType::SocSpec),
        b"CACHE_POOL" => Ok(ComponentType::CachePool),
        _ => Err(SuitError::UnsupportedComponentId),
    }
}

/// Decode the typed fields of a MEM component id:
/// `[type, cpu_id, run_address, size]`.
pub fn decode_component_id(component_id: &[u8]) -> SuitResult<MemComponentInfo> {
    let mut dec = Decoder::new(component_id);
    if dec.array()? != 4 {
        return Err(SuitError::Decoding);
    }
    // The type tag was matched by the dispatch layer; only its shape matters.
    dec.bstr()?;

    let cpu_id = inner_uint(&mut dec)?;
    let cpu_id = u8::try_from(cpu_id).map_err(|_| SuitError::Decoding)?;
    let run_address =
        usize::try_from(inner_uint(&mut dec)?).map_err(|_| SuitError::Decoding)?;
    let size = usize::try_from(inner_uint(&mut dec)?).map_err(|_| SuitError::Decoding)?;

    if !dec.is_at_end() {
        return Err(SuitError::Decoding);
    }
    Ok(MemComponentInfo {
        cpu_id,
        run_address,
        size,
    })
}

/// Decode the component number of a `[type, number]`-shaped component id.
pub fn decode_component_number(component_id: &[u8]) -> SuitResult<u32> {
    let mut dec = Decoder::new(component_id);
    if dec.array()? < 2 {
        return Err(SuitError::Decoding);
    }
    dec.bstr()?;
    let number = inner_uint(&mut dec)?;
    u32::try_from(number).map_err(|_| SuitError::Decoding)
}

/// Decode the manifest class id of an `INSTLD_MFST` component id. Both the
/// type literal and the 16-byte class id length are enforced.
pub fn decode_manifest_class_id(component_id: &[u8]) -> SuitResult<ManifestClassId> {
    let mut dec = Decoder::new(component_id);
    if dec.array()? < 2 {
        return Err(SuitError::Decoding);
    }
    let tag = inner_tstr(&mut dec)?;
    if tag != b"INSTLD_MFST" {
        return Err(SuitError::Decoding);
    }
    let class_id = dec.bstr()?;
    ManifestClassId::from_slice(class_id)
}
