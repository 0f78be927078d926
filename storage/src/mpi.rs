// Licensed under the Apache-2.0 license

//! Manifest Provisioning Information: the boot-time binding between manifest
//! roles and manifest class ids.

use suit_types::{ManifestClassId, ManifestRole, SuitError, SuitResult};

pub const MAX_MPI_ENTRIES: usize = 8;

#[derive(Debug, Clone, Copy)]
struct MpiEntry {
    role: ManifestRole,
    class_id: ManifestClassId,
}

/// In-memory role table, populated once during boot from flash-resident
/// provisioning descriptors.
#[derive(Debug)]
pub struct MpiTable {
    entries: [Option<MpiEntry>; MAX_MPI_ENTRIES],
}

impl MpiTable {
    pub const fn new() -> MpiTable {
        MpiTable {
            entries: [None; MAX_MPI_ENTRIES],
        }
    }

    /// Bind a role to a class id. Duplicate roles and duplicate class ids
    /// are both rejected.
    pub fn insert(&mut self, role: ManifestRole, class_id: ManifestClassId) -> SuitResult<()> {
        if self
            .entries
            .iter()
            .flatten()
            .any(|e| e.role == role || e.class_id == class_id)
        {
            return Err(SuitError::AlreadyExists);
        }

        match self.entries.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(MpiEntry { role, class_id });
                Ok(())
            }
            None => Err(SuitError::SizeLimit),
        }
    }

    pub fn class_get(&self, role: ManifestRole) -> SuitResult<ManifestClassId> {
        self.entries
            .iter()
            .flatten()
            .find(|e| e.role == role)
            .map(|e| e.class_id)
            .ok_or(SuitError::NotFound)
    }

    pub fn role_get(&self, class_id: &ManifestClassId) -> SuitResult<ManifestRole> {
        self.entries
            .iter()
            .flatten()
            .find(|e| e.class_id == *class_id)
            .map(|e| e.role)
            .ok_or(SuitError::NotFound)
    }

    /// Copy all bound class ids into `out`; returns the count.
    pub fn class_ids_get(&self, out: &mut [ManifestClassId]) -> SuitResult<usize> {
        let mut count = 0;
        for entry in self.entries.iter().flatten() {
            if count == out.len() {
                return Err(SuitError::SizeLimit);
            }
            out[count] = entry.class_id;
            count += 1;
        }
        Ok(count)
    }
}

impl Default for MpiTable {
    fn default() -> Self {
        MpiTable::new()
    }
}
