//! Conversation encryption keys.
//!
//! Each team folder carries a hierarchy of symmetric keys, one per
//! generation; a rekey mints the next generation. Envelopes record the
//! generation they were sealed with so receivers can pick the matching
//! key out of the hierarchy.

use cachet_crypto::SymmetricKey;

/// The generation carried by the public-conversation sentinel key.
pub const PUBLIC_KEY_GENERATION: u32 = 1;

/// A symmetric key tagged with its generation in the folder hierarchy.
#[derive(Clone)]
pub struct CryptKey {
    /// Generation number, incremented on every rekey.
    pub generation: u32,
    key: SymmetricKey,
}

impl CryptKey {
    /// Create a key for a given generation.
    pub fn new(generation: u32, key: SymmetricKey) -> Self {
        Self { generation, key }
    }

    /// The underlying symmetric key.
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }
}

impl std::fmt::Debug for CryptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CryptKey(gen={}, [REDACTED])", self.generation)
    }
}

/// The sentinel key for public conversations: all zeros, generation 1.
///
/// Public messages are still sealed and signed so the pipeline is uniform,
/// but the key hides nothing.
pub fn public_crypt_key() -> CryptKey {
    CryptKey::new(PUBLIC_KEY_GENERATION, SymmetricKey::zero())
}

/// The result of resolving a folder's key hierarchy.
#[derive(Clone, Debug)]
pub struct CryptKeysResult {
    /// The canonical form of the folder name.
    pub canonical_name: String,
    /// All key generations the caller may use.
    pub crypt_keys: Vec<CryptKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_sentinel() {
        let key = public_crypt_key();
        assert_eq!(key.generation, PUBLIC_KEY_GENERATION);
        assert_eq!(key.key().as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let key = CryptKey::new(3, SymmetricKey::generate());
        let debug = format!("{:?}", key);
        assert!(debug.contains("gen=3"));
        assert!(debug.contains("REDACTED"));
    }
}
