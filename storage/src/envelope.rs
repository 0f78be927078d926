// Licensed under the Apache-2.0 license

//! Envelope slot header and severed-envelope codecs.
//!
//! An envelope slot stores a CBOR map `{0: version, 1: class_id_offset,
//! 2: envelope bstr}`. The embedded byte string holds the severed envelope:
//! CBOR tag 107 over a map carrying the authentication wrapper (key 2) and
//! the manifest (key 3). All length-bearing values are limited to `0xFFFF`
//! so every header fits in one to three bytes.

use suit_cbor::{Decoder, Encoder};
use suit_types::{SuitError, SuitResult};

pub const ENVELOPE_SLOT_VERSION: u64 = 1;
const SLOT_KEY_VERSION: u64 = 0;
const SLOT_KEY_CLASS_ID_OFFSET: u64 = 1;
const SLOT_KEY_ENVELOPE: u64 = 2;

pub const ENVELOPE_TAG: u64 = 107;
pub const AUTHENTICATION_WRAPPER_KEY: u64 = 2;
pub const MANIFEST_KEY: u64 = 3;
pub const COMPONENT_ID_KEY: u64 = 5;

/// Tag 107 plus the two-pair map head of the re-encoded envelope.
pub const ENVELOPE_TAG_PREFIX: [u8; 3] = [0xD8, 0x6B, 0xA2];

/// Upper bound for an encoded slot header.
pub const ENCODED_HEADER_LEN_MAX: usize = 16;

const CLASS_ID_LEN: usize = 16;

/// Decoded envelope slot header. Both fields are views into the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader<'a> {
    pub class_id_offset: usize,
    pub envelope: &'a [u8],
}

impl<'a> EnvelopeHeader<'a> {
    /// Class id bytes addressed by `class_id_offset`, if in bounds.
    pub fn class_id_bytes(&self) -> SuitResult<&'a [u8]> {
        let end = self
            .class_id_offset
            .checked_add(CLASS_ID_LEN)
            .ok_or(SuitError::Decoding)?;
        self.envelope
            .get(self.class_id_offset..end)
            .ok_or(SuitError::Decoding)
    }
}

/// Severed envelope contents. All fields are views into the decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeveredEnvelope<'a> {
    pub authentication_wrapper: &'a [u8],
    pub manifest: &'a [u8],
    /// Raw component-id item from the manifest map.
    pub component_id: &'a [u8],
    /// Byte offset of the component-id item within the manifest.
    pub component_id_offset: usize,
}

/// Length of an encoded `key: bstr(len)` pair header.
pub fn kv_header_len(key: u64, bstr_len: usize) -> SuitResult<usize> {
    if key > 0xFFFF || bstr_len > 0xFFFF {
        return Err(SuitError::InvalidParameter);
    }
    Ok(suit_cbor::head_len(key) + suit_cbor::head_len(bstr_len as u64))
}

/// Encode a `key: bstr(len)` pair header into `buf`; returns bytes used.
pub fn encode_kv_header(key: u64, bstr_len: usize, buf: &mut [u8]) -> SuitResult<usize> {
    if key > 0xFFFF || bstr_len > 0xFFFF {
        return Err(SuitError::InvalidParameter);
    }
    let mut enc = Encoder::new(buf);
    enc.uint(key)?;
    enc.bstr_header(bstr_len)?;
    Ok(enc.position())
}

/// Decode and validate an envelope slot header.
///
/// The decoder accepts both definite and indefinite map heads and ignores
/// any pairs past the envelope byte string. `class_id_offset` must lie
/// within the embedded envelope and be at least 1.
pub fn decode_envelope_header(buf: &[u8]) -> SuitResult<EnvelopeHeader<'_>> {
    let mut dec = Decoder::new(buf);
    dec.map_header()?;

    if dec.uint()? != SLOT_KEY_VERSION || dec.uint()? != ENVELOPE_SLOT_VERSION {
        return Err(SuitError::Decoding);
    }
    if dec.uint()? != SLOT_KEY_CLASS_ID_OFFSET {
        return Err(SuitError::Decoding);
    }
    let class_id_offset = dec.size()?;
    if dec.uint()? != SLOT_KEY_ENVELOPE {
        return Err(SuitError::Decoding);
    }
    let envelope = dec.bstr()?;

    if class_id_offset < 1 || envelope.len() < class_id_offset {
        return Err(SuitError::Decoding);
    }

    Ok(EnvelopeHeader {
        class_id_offset,
        envelope,
    })
}

/// Encode an envelope slot header followed by the envelope tag prefix.
///
/// The caller appends the authentication wrapper and manifest pairs
/// afterwards; `envelope_len` must already account for them. Returns the
/// number of bytes written.
pub fn encode_envelope_header(
    class_id_offset: usize,
    envelope_len: usize,
    buf: &mut [u8],
) -> SuitResult<usize> {
    if class_id_offset == 0 || class_id_offset > 0xFFFF || envelope_len > 0xFFFF {
        return Err(SuitError::InvalidParameter);
    }

    let mut enc = Encoder::new(buf);
    enc.map(3)?;
    enc.uint(SLOT_KEY_VERSION)?;
    enc.uint(ENVELOPE_SLOT_VERSION)?;
    enc.uint(SLOT_KEY_CLASS_ID_OFFSET)?;
    enc.uint(class_id_offset as u64)?;
    enc.uint(SLOT_KEY_ENVELOPE)?;
    // The byte-string head is emitted in the three-byte form so its length
    // does not depend on the final envelope size.
    enc.raw(&[0x59, (envelope_len >> 8) as u8, envelope_len as u8])?;
    enc.raw(&ENVELOPE_TAG_PREFIX)?;
    Ok(enc.position())
}

fn scan_component_id(manifest: &[u8]) -> SuitResult<(usize, usize)> {
    let mut dec = Decoder::new(manifest);
    let pairs = dec.map_header()?;

    let mut remaining = pairs;
    loop {
        match remaining {
            Some(0) => return Err(SuitError::Decoding),
            Some(ref mut n) => *n -= 1,
            None => {
                if dec.peek_break()? {
                    return Err(SuitError::Decoding);
                }
            }
        }

        let key = dec.uint()?;
        if key == COMPONENT_ID_KEY {
            let start = dec.position();
            dec.skip_any()?;
            return Ok((start, dec.position()));
        }
        dec.skip_any()?;
    }
}

/// Decode a severed envelope and locate the manifest component id.
///
/// Returns the decoded views together with the number of bytes the envelope
/// actually occupies; trailing slot padding is not part of the envelope.
pub fn decode_severed(buf: &[u8]) -> SuitResult<(SeveredEnvelope<'_>, usize)> {
    let mut dec = Decoder::new(buf);
    if dec.tag()? != ENVELOPE_TAG {
        return Err(SuitError::Decoding);
    }
    let pairs = dec.map_header()?;
    // Both mandatory pairs must be inside the declared map; a shorter map
    // followed by loose key/value bytes is not an envelope.
    if let Some(n) = pairs {
        if n < 2 {
            return Err(SuitError::Decoding);
        }
    }

    if dec.uint()? != AUTHENTICATION_WRAPPER_KEY {
        return Err(SuitError::Decoding);
    }
    let authentication_wrapper = dec.bstr()?;
    if dec.uint()? != MANIFEST_KEY {
        return Err(SuitError::Decoding);
    }
    let manifest = dec.bstr()?;

    // Ignore any remaining pairs; severable elements may follow.
    match pairs {
        Some(n) => {
            for _ in 2..n {
                dec.skip_any()?;
                dec.skip_any()?;
            }
        }
        None => {
            while !dec.peek_break()? {
                dec.skip_any()?;
                dec.skip_any()?;
            }
            dec.break_stop()?;
        }
    }
    let envelope_len = dec.position();

    let (start, end) = scan_component_id(manifest)?;
    Ok((
        SeveredEnvelope {
            authentication_wrapper,
            manifest,
            component_id: &manifest[start..end],
            component_id_offset: start,
        },
        envelope_len,
    ))
}

/// Byte offset of the 16-byte class id inside an `INSTLD_MFST` component id.
pub fn class_id_content_offset(component_id: &[u8]) -> SuitResult<usize> {
    let mut dec = Decoder::new(component_id);
    if dec.array()? < 2 {
        return Err(SuitError::Decoding);
    }
    dec.bstr()?;
    let class_id = dec.bstr()?;
    if class_id.len() != CLASS_ID_LEN {
        return Err(SuitError::Decoding);
    }
    Ok(dec.position() - CLASS_ID_LEN)
}
