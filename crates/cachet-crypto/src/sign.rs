//! Detached Ed25519 signatures with domain separation.
//!
//! Message headers are signed detached: the signature travels next to the
//! payload rather than wrapping it. Every signature is computed over
//! `prefix || payload`, where the prefix is a context constant, so a
//! signature made for one protocol surface can never verify under another.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::{CryptoError, Result};

/// Size of a detached Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Version tag for detached prefixed signatures.
pub const SIGNATURE_VERSION: u32 = 2;

/// A public-key identifier: the 32 bytes of an Ed25519 verifying key.
///
/// Carrying the full key bytes means a verifier can be rebuilt from the
/// identifier alone; validity of the key for a given sender is checked
/// separately against the sender's device timeline.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Kid(#[serde(with = "serde_bytes")] Vec<u8>);

impl Kid {
    /// Create an identifier from raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Derive the identifier of a verifying key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes().to_vec())
    }

    /// Get the identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Rebuild the Ed25519 verifying key this identifier names.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKid` if the bytes are not a valid
    /// 32-byte Ed25519 public key.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let bytes: [u8; 32] = self
            .0
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKid(format!("{} bytes, expected 32", self.0.len())))?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKid(format!("not a valid curve point: {}", e)))
    }

    /// Format as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Debug for Kid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = self.0.iter().take(8).map(|b| format!("{:02x}", b)).collect::<String>();
        write!(f, "Kid({}...)", shown)
    }
}

/// A detached signature together with its version and signing key id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    /// Signature scheme version.
    pub version: u32,
    /// Raw 64-byte Ed25519 signature.
    #[serde(with = "serde_bytes")]
    pub sig: Vec<u8>,
    /// Identifier of the signing key.
    pub kid: Kid,
}

/// An Ed25519 signing keypair bound to a device.
pub struct SigningKeyPair {
    signing: SigningKey,
}

impl SigningKeyPair {
    /// Generate a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create a keypair from a 32-byte secret seed.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self {
            signing: SigningKey::from_bytes(&seed),
        })
    }

    /// The public identifier of this keypair.
    pub fn kid(&self) -> Kid {
        Kid::from_verifying_key(&self.signing.verifying_key())
    }

    /// Sign a raw message (no prefix). Prefer [`sign`] for protocol use.
    pub fn sign_raw(&self, msg: &[u8]) -> Signature {
        self.signing.sign(msg)
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid())
            .finish()
    }
}

/// Sign `payload` with a domain-separation `prefix`.
///
/// The signature is computed over `prefix || payload`. The returned
/// [`SignatureInfo`] carries the version tag and the signer's key id.
pub fn sign(payload: &[u8], keypair: &SigningKeyPair, prefix: &[u8]) -> Result<SignatureInfo> {
    let mut msg = Vec::with_capacity(prefix.len() + payload.len());
    msg.extend_from_slice(prefix);
    msg.extend_from_slice(payload);

    let sig = keypair.sign_raw(&msg);
    Ok(SignatureInfo {
        version: SIGNATURE_VERSION,
        sig: sig.to_bytes().to_vec(),
        kid: keypair.kid(),
    })
}

/// Verify a detached signature over `prefix || payload`.
///
/// Returns `false` on any failure: unknown version, malformed key id or
/// signature bytes, or an invalid signature. The Ed25519 primitive is its
/// own authenticator, so no additional constant-time handling is needed
/// at this layer.
pub fn verify(payload: &[u8], info: &SignatureInfo, prefix: &[u8]) -> bool {
    if info.version != SIGNATURE_VERSION {
        return false;
    }
    let verifying_key = match info.kid.verifying_key() {
        Ok(key) => key,
        Err(_) => return false,
    };
    let sig_bytes: [u8; SIGNATURE_SIZE] = match info.sig.as_slice().try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&sig_bytes);

    let mut msg = Vec::with_capacity(prefix.len() + payload.len());
    msg.extend_from_slice(prefix);
    msg.extend_from_slice(payload);

    verifying_key.verify(&msg, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &[u8] = b"Cachet-Test-1";

    #[test]
    fn test_sign_verify_roundtrip() {
        let keypair = SigningKeyPair::generate();
        let info = sign(b"payload", &keypair, PREFIX).unwrap();

        assert_eq!(info.version, SIGNATURE_VERSION);
        assert_eq!(info.sig.len(), SIGNATURE_SIZE);
        assert!(verify(b"payload", &info, PREFIX));
    }

    #[test]
    fn test_verify_fails_with_different_prefix() {
        let keypair = SigningKeyPair::generate();
        let info = sign(b"payload", &keypair, PREFIX).unwrap();

        assert!(!verify(b"payload", &info, b"Cachet-Other-1"));
    }

    #[test]
    fn test_verify_fails_with_different_payload() {
        let keypair = SigningKeyPair::generate();
        let info = sign(b"payload", &keypair, PREFIX).unwrap();

        assert!(!verify(b"other payload", &info, PREFIX));
    }

    #[test]
    fn test_verify_fails_with_wrong_signer_kid() {
        let keypair = SigningKeyPair::generate();
        let other = SigningKeyPair::generate();
        let mut info = sign(b"payload", &keypair, PREFIX).unwrap();

        info.kid = other.kid();
        assert!(!verify(b"payload", &info, PREFIX));
    }

    #[test]
    fn test_verify_fails_with_truncated_signature() {
        let keypair = SigningKeyPair::generate();
        let mut info = sign(b"payload", &keypair, PREFIX).unwrap();

        info.sig.truncate(32);
        assert!(!verify(b"payload", &info, PREFIX));
    }

    #[test]
    fn test_verify_fails_with_unknown_version() {
        let keypair = SigningKeyPair::generate();
        let mut info = sign(b"payload", &keypair, PREFIX).unwrap();

        info.version = 3;
        assert!(!verify(b"payload", &info, PREFIX));
    }

    #[test]
    fn test_verify_fails_with_garbage_kid() {
        let keypair = SigningKeyPair::generate();
        let mut info = sign(b"payload", &keypair, PREFIX).unwrap();

        info.kid = Kid::new(vec![0x42; 7]);
        assert!(!verify(b"payload", &info, PREFIX));
    }

    #[test]
    fn test_keypair_from_secret_bytes_deterministic() {
        let seed = [0x17u8; 32];
        let kp1 = SigningKeyPair::from_secret_bytes(&seed).unwrap();
        let kp2 = SigningKeyPair::from_secret_bytes(&seed).unwrap();

        assert_eq!(kp1.kid(), kp2.kid());

        let sig1 = sign(b"msg", &kp1, PREFIX).unwrap();
        let sig2 = sign(b"msg", &kp2, PREFIX).unwrap();
        assert_eq!(sig1.sig, sig2.sig);
    }

    #[test]
    fn test_keypair_from_secret_bytes_invalid_length() {
        let result = SigningKeyPair::from_secret_bytes(&[0u8; 16]);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_signature_info_serialization_roundtrip() {
        let keypair = SigningKeyPair::generate();
        let info = sign(b"payload", &keypair, PREFIX).unwrap();

        let bytes = rmp_serde::to_vec(&info).unwrap();
        let restored: SignatureInfo = rmp_serde::from_slice(&bytes).unwrap();

        assert_eq!(info, restored);
        assert!(verify(b"payload", &restored, PREFIX));
    }

    #[test]
    fn test_kid_debug_is_truncated() {
        let keypair = SigningKeyPair::generate();
        let debug = format!("{:?}", keypair.kid());
        assert!(debug.starts_with("Kid("));
        assert!(debug.contains("..."));
    }
}
