// Licensed under the Apache-2.0 license

//! Memoization of verified payload digests, keyed by component id.
//!
//! The cache is locked by default; mutations are only legal inside a
//! trusted manifest-processing window that explicitly unlocks it. Lookups
//! work either way. Keys and digests are copied into the entry, so a cached
//! digest stays valid after the envelope buffer it came from is replaced.

use suit_stream::DigestVerdict;
use suit_types::{SuitError, SuitResult};

pub const MAX_DIGEST_CACHE_ENTRIES: usize = 8;

const MAX_COMPONENT_ID_LEN: usize = 48;
const MAX_DIGEST_LEN: usize = 64;

#[derive(Clone, Copy)]
struct Entry {
    id: [u8; MAX_COMPONENT_ID_LEN],
    id_len: usize,
    digest: [u8; MAX_DIGEST_LEN],
    digest_len: usize,
}

impl Entry {
    fn id_bytes(&self) -> &[u8] {
        &self.id[..self.id_len]
    }

    fn digest_bytes(&self) -> &[u8] {
        &self.digest[..self.digest_len]
    }
}

pub struct DigestCache {
    entries: [Option<Entry>; MAX_DIGEST_CACHE_ENTRIES],
    unlocked: bool,
}

impl DigestCache {
    pub const fn new() -> DigestCache {
        DigestCache {
            entries: [None; MAX_DIGEST_CACHE_ENTRIES],
            unlocked: false,
        }
    }

    pub fn unlock(&mut self) {
        self.unlocked = true;
    }

    pub fn lock(&mut self) {
        self.unlocked = false;
    }

    fn check_unlocked(&self) -> SuitResult<()> {
        if self.unlocked {
            Ok(())
        } else {
            Err(SuitError::UnsupportedCommand)
        }
    }

    fn find(&self, component_id: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, Some(e) if e.id_bytes() == component_id))
    }

    /// Record a verified digest, replacing any entry for the same id.
    pub fn add(&mut self, component_id: &[u8], digest: &[u8]) -> SuitResult<()> {
        self.check_unlocked()?;
        if component_id.len() > MAX_COMPONENT_ID_LEN || digest.len() > MAX_DIGEST_LEN {
            return Err(SuitError::SizeLimit);
        }

        let index = self
            .find(component_id)
            .or_else(|| self.entries.iter().position(|e| e.is_none()))
            .ok_or(SuitError::Overflow)?;

        let mut entry = Entry {
            id: [0; MAX_COMPONENT_ID_LEN],
            id_len: component_id.len(),
            digest: [0; MAX_DIGEST_LEN],
            digest_len: digest.len(),
        };
        entry.id[..component_id.len()].copy_from_slice(component_id);
        entry.digest[..digest.len()].copy_from_slice(digest);
        self.entries[index] = Some(entry);
        Ok(())
    }

    pub fn remove(&mut self, component_id: &[u8]) -> SuitResult<()> {
        self.check_unlocked()?;
        if let Some(index) = self.find(component_id) {
            self.entries[index] = None;
        }
        Ok(())
    }

    pub fn remove_all(&mut self) -> SuitResult<()> {
        self.check_unlocked()?;
        self.entries = [None; MAX_DIGEST_CACHE_ENTRIES];
        Ok(())
    }

    /// Compare a digest against the cached one. Absence is distinct from a
    /// cached-but-different digest.
    pub fn compare(&self, component_id: &[u8], digest: &[u8]) -> SuitResult<DigestVerdict> {
        let index = self.find(component_id).ok_or(SuitError::NotFound)?;
        let entry = self.entries[index].as_ref().ok_or(SuitError::NotFound)?;
        if entry.digest_bytes() == digest {
            Ok(DigestVerdict::Match)
        } else {
            Ok(DigestVerdict::Mismatch)
        }
    }
}

impl Default for DigestCache {
    fn default() -> Self {
        DigestCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &[u8] = b"component-a";
    const ID_B: &[u8] = b"component-b";

    fn unlocked() -> DigestCache {
        let mut cache = DigestCache::new();
        cache.unlock();
        cache
    }

    #[test]
    fn test_mutations_fail_while_locked() {
        let mut cache = DigestCache::new();
        assert_eq!(cache.add(ID_A, &[1; 32]), Err(SuitError::UnsupportedCommand));
        assert_eq!(cache.remove(ID_A), Err(SuitError::UnsupportedCommand));
        assert_eq!(cache.remove_all(), Err(SuitError::UnsupportedCommand));
    }

    #[test]
    fn test_compare_works_locked_or_unlocked() {
        let mut cache = unlocked();
        cache.add(ID_A, &[1; 32]).unwrap();
        cache.lock();
        assert_eq!(cache.compare(ID_A, &[1; 32]), Ok(DigestVerdict::Match));
        assert_eq!(cache.compare(ID_A, &[2; 32]), Ok(DigestVerdict::Mismatch));
        assert_eq!(cache.compare(ID_B, &[1; 32]), Err(SuitError::NotFound));
    }

    #[test]
    fn test_add_is_an_upsert() {
        let mut cache = unlocked();
        cache.add(ID_A, &[1; 32]).unwrap();
        cache.add(ID_A, &[9; 32]).unwrap();
        assert_eq!(cache.compare(ID_A, &[9; 32]), Ok(DigestVerdict::Match));
        // The upsert reused the entry, leaving room for others.
        for i in 0..(MAX_DIGEST_CACHE_ENTRIES - 1) as u8 {
            cache.add(&[i], &[i; 32]).unwrap();
        }
        assert_eq!(cache.add(ID_B, &[0; 32]), Err(SuitError::Overflow));
    }

    #[test]
    fn test_remove_and_remove_all() {
        let mut cache = unlocked();
        cache.add(ID_A, &[1; 32]).unwrap();
        cache.add(ID_B, &[2; 32]).unwrap();
        cache.remove(ID_A).unwrap();
        assert_eq!(cache.compare(ID_A, &[1; 32]), Err(SuitError::NotFound));
        assert_eq!(cache.compare(ID_B, &[2; 32]), Ok(DigestVerdict::Match));
        cache.remove_all().unwrap();
        assert_eq!(cache.compare(ID_B, &[2; 32]), Err(SuitError::NotFound));
    }

    #[test]
    fn test_cached_digest_survives_source_buffer_reuse() {
        let mut cache = unlocked();
        let mut digest = [0xAB; 32];
        cache.add(ID_A, &digest).unwrap();
        digest.fill(0);
        assert_eq!(cache.compare(ID_A, &[0xAB; 32]), Ok(DigestVerdict::Match));
    }
}
