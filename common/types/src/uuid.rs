// Licensed under the Apache-2.0 license

use crate::error::{SuitError, SuitResult};

pub const UUID_SIZE: usize = 16;

/// 128-bit RFC4122 identifier, compared byte-wise. Used for vendor ids,
/// manifest class ids, and device ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uuid([u8; UUID_SIZE]);

impl Uuid {
    pub const fn new(bytes: [u8; UUID_SIZE]) -> Uuid {
        Uuid(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SuitResult<Uuid> {
        let raw: [u8; UUID_SIZE] = bytes.try_into().map_err(|_| SuitError::Decoding)?;
        Ok(Uuid(raw))
    }

    pub fn as_bytes(&self) -> &[u8; UUID_SIZE] {
        &self.0
    }
}

/// A manifest class id is a UUID scoped to one vendor's manifest namespace.
pub type ManifestClassId = Uuid;
