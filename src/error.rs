//! Error types for the decryption engine.

use thiserror::Error;

/// Errors that can occur while decrypting an account record.
///
/// Failures computing the RID or the LM/NT hashes are fatal for that record;
/// failures in the optional supplemental-credentials field are reported as
/// diagnostics by the caller and never abort the record.
#[derive(Debug, Error)]
pub enum DitError {
    /// The binary SID length is inconsistent with its declared sub-authority count.
    #[error("malformed SID: {0}")]
    MalformedSid(String),

    /// An encrypted blob is shorter than the minimum for its detected layout.
    #[error("encrypted blob truncated: need at least {need} bytes, got {got}")]
    TruncatedBlob { need: usize, got: usize },

    /// A blob referenced a PEK slot past the end of the key table.
    #[error("PEK index {index} out of range (table holds {len} keys)")]
    KeyIndexOutOfRange { index: usize, len: usize },

    /// Block-cipher input was empty or not a multiple of the block size.
    #[error("cipher length error: {0}")]
    CipherLength(String),

    /// Hash material handed to the DES layer was not exactly 16 bytes.
    #[error("invalid hash length: expected 16 bytes, got {0}")]
    InvalidHashLength(usize),

    /// Decrypted supplemental-credentials plaintext cannot hold a property table.
    #[error("user-properties blob too short: expected more than 100 bytes, got {0}")]
    PropertyBlobTooShort(usize),
}

/// Result type for decryption operations.
pub type DitResult<T> = Result<T, DitError>;
