//! Deterministic binary encoding of protocol records.
//!
//! All records are encoded as MessagePack with positional (array) struct
//! encoding. Field order is fixed by declaration order, so encoding the
//! same value always yields the same bytes. That determinism is load
//! bearing: header signatures are computed over the encoded form, and the
//! verifier must be able to reproduce the signer's bytes exactly.
//!
//! Unknown versioned variants are preserved as decoded MessagePack values
//! (extension tags included) so they survive a decode/re-encode cycle; see
//! [`crate::version`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors from record encoding and decoding.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Encoding a record failed.
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Decoding a record failed.
    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Encode a record to its deterministic binary form.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(value)?)
}

/// Decode a record from its binary form.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}
