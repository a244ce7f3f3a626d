//! NaCl secretbox symmetric encryption.
//!
//! Provides authenticated encryption with 256-bit keys and 192-bit nonces
//! (XSalsa20-Poly1305).
//!
//! ## Security Notes
//!
//! - Keys are zeroized on drop
//! - Nonces are randomly generated using OsRng
//! - NEVER reuse a nonce with the same key

use crypto_secretbox::{
    aead::{Aead, KeyInit},
    Nonce, XSalsa20Poly1305,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

/// Size of symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of nonce in bytes (192 bits for XSalsa20).
pub const NONCE_SIZE: usize = 24;

/// On-wire version tag for sealed data.
pub const SEALED_VERSION: u32 = 1;

/// A 256-bit symmetric key for secretbox encryption.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generate a new random symmetric key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// The all-zero key. Used as the shared sentinel for public
    /// conversations, where confidentiality is not a goal.
    pub fn zero() -> Self {
        Self {
            bytes: [0u8; KEY_SIZE],
        }
    }

    /// Create a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this - avoid logging or persisting the returned bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// Sealed ciphertext with its version tag and nonce.
///
/// This is the on-wire shape of both the header and body ciphertexts of a
/// boxed message. The nonce travels with the ciphertext; the version tag
/// selects the sealing construction (only version 1 exists today).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Sealing construction version.
    pub version: u32,
    /// The ciphertext with authentication tag appended.
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    /// The 24-byte nonce used for encryption.
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
}

/// Encrypt plaintext bytes using XSalsa20-Poly1305.
///
/// Draws a fresh random 24-byte nonce from the OS CSPRNG for every call.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the underlying AEAD fails.
pub fn seal(plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedData> {
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption("secretbox seal failed".into()))?;

    Ok(EncryptedData {
        version: SEALED_VERSION,
        ciphertext,
        nonce: nonce.to_vec(),
    })
}

/// Decrypt sealed data using XSalsa20-Poly1305.
///
/// # Errors
///
/// - `CryptoError::BadNonce` if the nonce is not exactly 24 bytes
/// - `CryptoError::DecryptOpen` if the ciphertext has been tampered with
///   or the wrong key is used
pub fn open(sealed: &EncryptedData, key: &SymmetricKey) -> Result<Vec<u8>> {
    if sealed.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::BadNonce {
            expected: NONCE_SIZE,
            actual: sealed.nonce.len(),
        });
    }
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptOpen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = SymmetricKey::generate();
        let plaintext = b"hello, cachet";

        let sealed = seal(plaintext, &key).unwrap();
        let opened = open(&sealed, &key).unwrap();

        assert_eq!(plaintext.as_slice(), opened.as_slice());
        assert_eq!(sealed.version, SEALED_VERSION);
        assert_eq!(sealed.nonce.len(), NONCE_SIZE);
    }

    #[test]
    fn test_open_fails_with_wrong_key() {
        let key1 = SymmetricKey::generate();
        let key2 = SymmetricKey::generate();

        let sealed = seal(b"secret", &key1).unwrap();
        let result = open(&sealed, &key2);

        assert!(matches!(result, Err(CryptoError::DecryptOpen)));
    }

    #[test]
    fn test_open_fails_with_tampered_ciphertext() {
        let key = SymmetricKey::generate();

        let mut sealed = seal(b"secret", &key).unwrap();
        if let Some(byte) = sealed.ciphertext.get_mut(0) {
            *byte ^= 0xFF;
        }
        let result = open(&sealed, &key);

        assert!(matches!(result, Err(CryptoError::DecryptOpen)));
    }

    #[test]
    fn test_open_fails_with_short_nonce() {
        let key = SymmetricKey::generate();

        let mut sealed = seal(b"secret", &key).unwrap();
        sealed.nonce.truncate(12);
        let result = open(&sealed, &key);

        assert!(matches!(
            result,
            Err(CryptoError::BadNonce {
                expected: 24,
                actual: 12
            })
        ));
    }

    #[test]
    fn test_different_nonces_produce_different_ciphertext() {
        let key = SymmetricKey::generate();

        let sealed1 = seal(b"same message", &key).unwrap();
        let sealed2 = seal(b"same message", &key).unwrap();

        assert_ne!(sealed1.nonce, sealed2.nonce);
        assert_ne!(sealed1.ciphertext, sealed2.ciphertext);
    }

    #[test]
    fn test_empty_plaintext() {
        let key = SymmetricKey::generate();

        let sealed = seal(b"", &key).unwrap();
        let opened = open(&sealed, &key).unwrap();

        assert!(opened.is_empty());
        // Authentication tag is still present.
        assert!(!sealed.ciphertext.is_empty());
    }

    #[test]
    fn test_zero_key_is_all_zeros() {
        let key = SymmetricKey::zero();
        assert_eq!(key.as_bytes(), &[0u8; KEY_SIZE]);
    }

    #[test]
    fn test_key_from_bytes_invalid_length() {
        let result = SymmetricKey::from_bytes(&[0u8; 16]);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = SymmetricKey::generate();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_encrypted_data_serialization() {
        let key = SymmetricKey::generate();
        let sealed = seal(b"wire format", &key).unwrap();

        let bytes = rmp_serde::to_vec(&sealed).unwrap();
        let restored: EncryptedData = rmp_serde::from_slice(&bytes).unwrap();

        assert_eq!(sealed, restored);
        assert_eq!(open(&restored, &key).unwrap(), b"wire format");
    }
}
