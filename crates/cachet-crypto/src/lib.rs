//! # cachet-crypto
//!
//! Cryptographic primitives for the cachet message sealing core.
//!
//! This crate provides:
//!
//! - **Hashing**: SHA-256 content hashes with constant-time comparison
//! - **Symmetric Encryption**: NaCl secretbox (XSalsa20-Poly1305) with
//!   random 24-byte nonces
//! - **Digital Signatures**: detached Ed25519 signatures with a
//!   domain-separation prefix
//!
//! ## Security
//!
//! Symmetric key material is zeroized on drop. Hash equality is
//! constant-time. Nonces are drawn from the OS CSPRNG on every seal and
//! are never reused.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod hash;
pub mod secretbox;
pub mod sign;

pub use error::{CryptoError, Result};
pub use hash::Hash;
pub use secretbox::{open, seal, EncryptedData, SymmetricKey, KEY_SIZE, NONCE_SIZE};
pub use sign::{sign, verify, Kid, SignatureInfo, SigningKeyPair, SIGNATURE_SIZE};
