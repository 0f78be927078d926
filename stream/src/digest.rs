// Licensed under the Apache-2.0 license

//! Digest-verifying sink over the SHA-2 family.

use crate::sink::StreamSink;
use sha2::{Digest, Sha256, Sha512};
use suit_types::SuitResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

/// Outcome of a digest comparison. A mismatch is a normal result the caller
/// maps to a failed condition; engine failures surface as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestVerdict {
    Match,
    Mismatch,
}

enum Engine {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Engine {
    fn update(&mut self, data: &[u8]) {
        match self {
            Engine::Sha256(e) => e.update(data),
            Engine::Sha512(e) => e.update(data),
        }
    }

    /// Finalized digest written into `out`; returns its length.
    fn finalize(self, out: &mut [u8; 64]) -> usize {
        match self {
            Engine::Sha256(e) => {
                out[..32].copy_from_slice(&e.finalize());
                32
            }
            Engine::Sha512(e) => {
                out.copy_from_slice(&e.finalize());
                64
            }
        }
    }
}

/// Sink feeding every written byte into a running hash.
///
/// Finalize with [`DigestSink::digest_match`]; an expected digest whose
/// length does not match the algorithm's output is a mismatch, not an
/// error, since it comes from untrusted manifest data.
pub struct DigestSink<'a> {
    engine: Engine,
    expected: &'a [u8],
    used: usize,
}

impl<'a> DigestSink<'a> {
    pub fn new(algorithm: DigestAlgorithm, expected: &'a [u8]) -> DigestSink<'a> {
        let engine = match algorithm {
            DigestAlgorithm::Sha256 => Engine::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Engine::Sha512(Sha512::new()),
        };
        DigestSink {
            engine,
            expected,
            used: 0,
        }
    }

    pub fn digest_match(self) -> SuitResult<DigestVerdict> {
        let mut out = [0u8; 64];
        let len = self.engine.finalize(&mut out);
        if self.expected == &out[..len] {
            Ok(DigestVerdict::Match)
        } else {
            log::debug!("digest mismatch after {} bytes", self.used);
            Ok(DigestVerdict::Mismatch)
        }
    }
}

impl StreamSink for DigestSink<'_> {
    fn write(&mut self, data: &[u8]) -> SuitResult<usize> {
        self.engine.update(data);
        self.used += data.len();
        Ok(data.len())
    }

    fn used_storage(&self) -> SuitResult<usize> {
        Ok(self.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256("abc")
    const ABC_SHA256: [u8; 32] = [
        0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22,
        0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00,
        0x15, 0xad,
    ];

    #[test]
    fn test_match_across_split_writes() {
        let mut sink = DigestSink::new(DigestAlgorithm::Sha256, &ABC_SHA256);
        sink.write(b"a").unwrap();
        sink.write(b"bc").unwrap();
        assert_eq!(sink.digest_match(), Ok(DigestVerdict::Match));
    }

    #[test]
    fn test_mismatch_is_a_verdict() {
        let mut sink = DigestSink::new(DigestAlgorithm::Sha256, &ABC_SHA256);
        sink.write(b"abd").unwrap();
        assert_eq!(sink.digest_match(), Ok(DigestVerdict::Mismatch));
    }

    #[test]
    fn test_wrong_length_expected_digest() {
        let mut sink = DigestSink::new(DigestAlgorithm::Sha512, &ABC_SHA256);
        sink.write(b"abc").unwrap();
        assert_eq!(sink.digest_match(), Ok(DigestVerdict::Mismatch));
    }
}
