//! SHA-256 content hashing.
//!
//! Provides the 32-byte hash type used to bind message headers to body
//! ciphertexts and to identify headers in the history chain. Equality is
//! constant-time: hash comparisons sit on the verification path.

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A 32-byte SHA-256 hash value.
#[derive(Clone, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Hash size in bytes.
    pub const SIZE: usize = 32;

    /// Compute the version-1 content hash (SHA-256) of `data`.
    pub fn sha256_v1(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(&digest);
        Self(arr)
    }

    /// Create a hash from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(crate::CryptoError::InvalidHashLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Get the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to an owned byte array.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Format as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for byte in &self.0 {
            s.push_str(&format!("{:02x}", byte));
        }
        s
    }
}

impl PartialEq for Hash {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Hash {}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short_hex: String = self.0[..8].iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "Hash({}...)", short_hex)
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

struct HashVisitor;

impl<'de> Visitor<'de> for HashVisitor {
    type Value = Hash;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "32 bytes")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Hash, E> {
        Hash::from_bytes(v).map_err(E::custom)
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Hash, E> {
        Hash::from_bytes(&v).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Hash, A::Error> {
        let mut bytes = Vec::with_capacity(Hash::SIZE);
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Hash::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_bytes(HashVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc")
        let hash = Hash::sha256_v1(b"abc");
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_deterministic() {
        let a = Hash::sha256_v1(b"same input");
        let b = Hash::sha256_v1(b"same input");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_differs_on_different_input() {
        let a = Hash::sha256_v1(b"input one");
        let b = Hash::sha256_v1(b"input two");
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_bytes_roundtrip() {
        let hash = Hash::sha256_v1(b"roundtrip");
        let restored = Hash::from_bytes(hash.as_bytes()).unwrap();
        assert_eq!(hash, restored);
    }

    #[test]
    fn test_from_bytes_invalid_length() {
        let result = Hash::from_bytes(&[0u8; 16]);
        assert!(matches!(
            result,
            Err(crate::CryptoError::InvalidHashLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let hash = Hash::sha256_v1(b"serialize me");
        let bytes = rmp_serde::to_vec(&hash).unwrap();
        let restored: Hash = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(hash, restored);
    }

    #[test]
    fn test_debug_is_truncated() {
        let hash = Hash::sha256_v1(b"debug");
        let debug = format!("{:?}", hash);
        assert!(debug.starts_with("Hash("));
        assert!(debug.contains("..."));
    }
}
