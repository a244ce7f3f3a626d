//! Error types for boxing and unboxing.
//!
//! Unboxing errors carry a two-level classification. A *permanent* error
//! means the envelope itself is bad: re-running the same unbox later can
//! never succeed, so the failure is exported as a stored
//! [`MessageUnboxedError`](crate::unboxed::MessageUnboxedError) record. A
//! *transient* error means a retry with fresher key, user, or merkle state
//! could succeed, so nothing is persisted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cachet_crypto::CryptoError;

use crate::codec::CodecError;
use crate::guard::ReplayError;
use crate::resolver::{KeyFinderError, LoaderError, MerkleError};

/// Errors that can occur while boxing an outgoing message.
#[derive(Error, Debug)]
pub enum BoxingError {
    /// The plaintext carried an empty TLF name.
    #[error("blank TLF name given")]
    BlankTlfName,

    /// The key resolver canonicalized the TLF name to an empty string.
    #[error("blank canonical TLF name received for {original:?}")]
    BlankCanonicalName {
        /// The name the caller supplied.
        original: String,
    },

    /// Key resolution failed; retry later.
    #[error("conversation keys unavailable: {0}")]
    CryptKeys(#[from] KeyFinderError),

    /// The resolver returned no usable key for the conversation.
    #[error("no key found for tlf {tlf_name:?} (public: {public})")]
    NoKeyFound {
        /// TLF the key was requested for.
        tlf_name: String,
        /// Whether the conversation is public.
        public: bool,
    },

    /// The merkle root snapshot could not be fetched.
    #[error("merkle root unavailable: {0}")]
    MerkleRoot(#[from] MerkleError),

    /// Sealing or signing failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Record encoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl BoxingError {
    /// Whether retrying the same box call can never succeed.
    ///
    /// Key-resolution failures are the retryable case; everything else
    /// reflects bad input or a broken local state.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, BoxingError::CryptKeys(_) | BoxingError::NoKeyFound { .. })
    }
}

/// Stored classification of a permanent unbox failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnboxErrorKind {
    /// Catch-all decoding / decryption failures.
    Misc,
    /// Unknown on-wire version whose producer marked it critical.
    BadVersionCritical,
    /// Unknown on-wire version that may be shown as a placeholder.
    BadVersion,
    /// Signer identity or key-validity failure.
    Identity,
    /// Transient failure; never stored.
    Ephemeral,
}

/// Errors that can occur while unboxing an incoming envelope.
#[derive(Error, Debug)]
pub enum UnboxingError {
    // --- permanent ---
    /// The envelope carried no server header.
    #[error("missing server header in boxed message")]
    MissingServerHeader,

    /// The body ciphertext was empty but the message was not superseded.
    #[error("empty body for a message that was never superseded")]
    EmptyBodyNotSuperseded,

    /// The body ciphertext hash did not match the hash bound in the header.
    #[error("body hash does not match the hash signed into the header")]
    BodyHashMismatch,

    /// The header plaintext carried no signature.
    #[error("header signature missing")]
    MissingHeaderSignature,

    /// The header signature failed to verify.
    #[error("header signature invalid")]
    BadSignature,

    /// The signing key is not known for the claimed sender.
    #[error("sender key not found")]
    SenderKeyNotFound,

    /// The signing key was not valid for the sender at the message ctime.
    #[error("key invalid for sender at message ctime")]
    SenderKeyInvalidAtCtime,

    /// A revoked key carried a zero revocation clock time.
    #[error("zero clock time on revoked key")]
    ZeroRevocationTime,

    /// The header plaintext used an unprocessable version.
    #[error("unhandled header version {version}")]
    HeaderVersion {
        /// The on-wire version tag.
        version: u32,
        /// Whether the producer marked the version critical.
        critical: bool,
    },

    /// The body plaintext used an unprocessable version.
    #[error("unhandled body version {version}")]
    BodyVersion {
        /// The on-wire version tag.
        version: u32,
        /// Whether the producer marked the version critical.
        critical: bool,
    },

    /// The replay index rejected the body hash as a duplicate.
    #[error("replayed body hash: {0}")]
    ReplayedBodyHash(#[source] ReplayError),

    /// The history index rejected a header hash or prev pointer.
    #[error("inconsistent header hash: {0}")]
    InconsistentHeaderHash(#[source] ReplayError),

    /// Opening a ciphertext failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Decoding a record failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    // --- transient ---
    /// Key resolution failed (including rekey-needed); retry later.
    #[error("conversation keys unavailable: {0}")]
    KeyFinder(#[from] KeyFinderError),

    /// No key with the envelope's generation was returned by the resolver.
    #[error("no key found for generation {generation}")]
    NoKeyForGeneration {
        /// The generation the envelope was sealed with.
        generation: u32,
    },

    /// The user loader backend failed; retry later.
    #[error("user lookup unavailable: {0}")]
    UserLoader(#[source] LoaderError),
}

impl UnboxingError {
    /// Whether retrying the same unbox later can never succeed.
    pub fn is_permanent(&self) -> bool {
        !matches!(
            self,
            UnboxingError::KeyFinder(_)
                | UnboxingError::NoKeyForGeneration { .. }
                | UnboxingError::UserLoader(_)
        )
    }

    /// The stored classification of this error.
    pub fn export_kind(&self) -> UnboxErrorKind {
        match self {
            UnboxingError::HeaderVersion { critical, .. }
            | UnboxingError::BodyVersion { critical, .. } => {
                if *critical {
                    UnboxErrorKind::BadVersionCritical
                } else {
                    UnboxErrorKind::BadVersion
                }
            }
            UnboxingError::SenderKeyNotFound
            | UnboxingError::SenderKeyInvalidAtCtime
            | UnboxingError::ZeroRevocationTime => UnboxErrorKind::Identity,
            UnboxingError::KeyFinder(_)
            | UnboxingError::NoKeyForGeneration { .. }
            | UnboxingError::UserLoader(_) => UnboxErrorKind::Ephemeral,
            _ => UnboxErrorKind::Misc,
        }
    }
}
