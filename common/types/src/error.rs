// Licensed under the Apache-2.0 license

use suit_cbor::CborError;

/// Error taxonomy shared by every layer of the engine.
///
/// `FailCondition` is the recoverable "well-formed request, condition not
/// met" class (digest mismatch, capability check failed) that manifest
/// try-each logic is allowed to absorb. `Crash` marks violated internal
/// invariants and aborts the current manifest-processing attempt only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuitError {
    /// Malformed CBOR or structure; decoded fields must not be trusted.
    Decoding,
    /// Component id not recognized by the active configuration.
    UnsupportedComponentId,
    /// Operation not implemented by the selected backend.
    UnsupportedCommand,
    /// Requested payload range is not available.
    UnavailablePayload,
    /// The manifest does not carry the requested command sequence.
    UnavailableCommandSeq,
    /// A required parameter was not provided.
    UnavailableParameter,
    /// Condition not met; recoverable by manifest try-each logic.
    FailCondition,
    /// Signature or digest verification failed.
    Authentication,
    /// Internal invariant violated.
    Crash,
    Busy,
    /// Bounded pool exhausted.
    NoResources,
    /// Fixed-capacity table is full.
    Overflow,
    NotFound,
    AlreadyExists,
    /// Destination or table too small for the request.
    SizeLimit,
    OutOfBounds,
    InvalidParameter,
}

pub type SuitResult<T> = Result<T, SuitError>;

impl From<CborError> for SuitError {
    fn from(_: CborError) -> SuitError {
        SuitError::Decoding
    }
}
