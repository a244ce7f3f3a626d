//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Sealed data carried a nonce of the wrong length.
    #[error("bad nonce length: expected {expected}, got {actual}")]
    BadNonce {
        /// Expected nonce length.
        expected: usize,
        /// Actual nonce length.
        actual: usize,
    },

    /// Authenticated decryption failed (tampered ciphertext or wrong key).
    #[error("decryption failed: ciphertext did not authenticate")]
    DecryptOpen,

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length.
        expected: usize,
        /// Actual key length.
        actual: usize,
    },

    /// Invalid hash length.
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidHashLength {
        /// Expected hash length.
        expected: usize,
        /// Actual hash length.
        actual: usize,
    },

    /// Invalid public-key identifier.
    #[error("invalid key identifier: {0}")]
    InvalidKid(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
