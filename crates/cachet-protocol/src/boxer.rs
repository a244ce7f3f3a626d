//! The message boxer and its sealing pipeline.
//!
//! A [`Boxer`] owns no network state of its own: key resolution, user
//! lookup, merkle tracking, and the replay indexes are all supplied as a
//! [`Collaborators`] bundle at construction, so tests substitute fakes
//! and the core stays re-entrant. One instance may be shared freely
//! across tasks.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use cachet_crypto::{
    secretbox, Hash, SignatureInfo, SigningKeyPair, SymmetricKey,
};

use crate::body::{BodyPlaintext, BodyPlaintextV1};
use crate::codec;
use crate::envelope::{MessageBoxed, MessagePlaintext};
use crate::error::{BoxingError, UnboxingError};
use crate::guard::{BodyHashChecker, PrevChecker};
use crate::header::{HeaderPlaintext, HeaderPlaintextV1};
use crate::keys::{public_crypt_key, CryptKey};
use crate::resolver::{KeyFinder, MerkleClient, UserLoader};
use crate::types::MerkleRoot;
use crate::unboxed::MessageUnboxedError;

/// Domain-separation prefix for chat header signatures.
///
/// A signature made under this prefix can never verify in any other
/// signing context, and vice versa.
pub const SIGNATURE_PREFIX_CHAT: &[u8] = b"Keybase-Chat-2";

/// The signing hook: `(payload, keypair, prefix) -> signature info`.
///
/// A plain function pointer so tests can inject broken or malleable
/// signers without touching the rest of the pipeline.
pub type SignFn = fn(&[u8], &SigningKeyPair, &[u8]) -> cachet_crypto::Result<SignatureInfo>;

/// Everything the boxer consults outside its own process.
#[derive(Clone)]
pub struct Collaborators {
    /// Resolves folder names to key hierarchies.
    pub key_finder: Arc<dyn KeyFinder>,
    /// Resolves sender metadata and key timelines.
    pub user_loader: Arc<dyn UserLoader>,
    /// Tracks the identity-tree root.
    pub merkle_client: Arc<dyn MerkleClient>,
    /// Replay index over body ciphertext hashes.
    pub body_hash_checker: BodyHashChecker,
    /// Consistency index over header hashes and prev pointers.
    pub prev_checker: PrevChecker,
}

/// Seals outgoing messages and verifies/opens incoming ones.
pub struct Boxer {
    pub(crate) key_finder: Arc<dyn KeyFinder>,
    pub(crate) user_loader: Arc<dyn UserLoader>,
    pub(crate) merkle_client: Arc<dyn MerkleClient>,
    pub(crate) body_hash_checker: BodyHashChecker,
    pub(crate) prev_checker: PrevChecker,
    pub(crate) hash_v1: fn(&[u8]) -> Hash,
    pub(crate) sign: SignFn,
}

impl Boxer {
    /// Create a boxer over a collaborator bundle.
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            key_finder: collaborators.key_finder,
            user_loader: collaborators.user_loader,
            merkle_client: collaborators.merkle_client,
            body_hash_checker: collaborators.body_hash_checker,
            prev_checker: collaborators.prev_checker,
            hash_v1: Hash::sha256_v1,
            sign: cachet_crypto::sign,
        }
    }

    /// Replace the signing hook.
    pub fn with_signer(mut self, sign: SignFn) -> Self {
        self.sign = sign;
        self
    }

    /// Seal a plaintext message into an envelope, using the most recent
    /// key of its folder.
    ///
    /// The TLF name is rewritten to the canonical form returned by the
    /// key finder, and the latest merkle root snapshot (if any) is
    /// attached to the client header before it is signed into the sealed
    /// header.
    ///
    /// # Errors
    ///
    /// - [`BoxingError::BlankTlfName`] / [`BoxingError::BlankCanonicalName`]
    ///   for empty folder names (permanent)
    /// - [`BoxingError::CryptKeys`] when key resolution fails (transient)
    /// - [`BoxingError::NoKeyFound`] when the hierarchy is empty (transient)
    /// - [`BoxingError::MerkleRoot`] when the root fetch fails (permanent)
    pub async fn box_message(
        &self,
        mut msg: MessagePlaintext,
        signing_key: &SigningKeyPair,
    ) -> Result<MessageBoxed, BoxingError> {
        let tlf_name = msg.client_header.tlf_name.clone();
        if tlf_name.is_empty() {
            return Err(BoxingError::BlankTlfName);
        }

        let tlf_public = msg.client_header.tlf_public;
        let cres = self.key_finder.find(&tlf_name, tlf_public).await?;
        msg.client_header.tlf_name = cres.canonical_name.clone();

        let recent_key = if tlf_public {
            Some(public_crypt_key())
        } else {
            cres.crypt_keys
                .iter()
                .max_by_key(|key| key.generation)
                .cloned()
        };

        msg.client_header.merkle_root = self.latest_merkle_root().await?;

        if msg.client_header.tlf_name.is_empty() {
            return Err(BoxingError::BlankCanonicalName { original: tlf_name });
        }

        let recent_key = recent_key.ok_or(BoxingError::NoKeyFound {
            tlf_name,
            public: tlf_public,
        })?;

        self.box_message_with_key(msg, &recent_key, signing_key)
    }

    /// Seal and sign a plaintext with a specific key.
    fn box_message_with_key(
        &self,
        msg: MessagePlaintext,
        key: &CryptKey,
        signing_key: &SigningKeyPair,
    ) -> Result<MessageBoxed, BoxingError> {
        let body = BodyPlaintext::V1(BodyPlaintextV1 {
            message_body: msg.message_body,
        });
        let encrypted_body = self.seal(&body, key.key())?;

        let body_hash = (self.hash_v1)(&encrypted_body.ciphertext);

        let mut header = HeaderPlaintextV1 {
            conv: msg.client_header.conv.clone(),
            tlf_name: msg.client_header.tlf_name.clone(),
            tlf_public: msg.client_header.tlf_public,
            message_type: msg.client_header.message_type,
            prev: msg.client_header.prev.clone(),
            sender: msg.client_header.sender.clone(),
            sender_device: msg.client_header.sender_device.clone(),
            body_hash,
            outbox_info: msg.client_header.outbox_info.clone(),
            outbox_id: msg.client_header.outbox_id.clone(),
            header_signature: None,
        };

        let sig = (self.sign)(&header.signing_payload()?, signing_key, SIGNATURE_PREFIX_CHAT)?;
        header.header_signature = Some(sig);

        let encrypted_header = self.seal(&HeaderPlaintext::V1(header), key.key())?;

        Ok(MessageBoxed {
            client_header: msg.client_header,
            header_ciphertext: encrypted_header,
            body_ciphertext: encrypted_body,
            server_header: None,
            key_generation: key.generation,
        })
    }

    /// Encode a record and seal the encoding.
    pub(crate) fn seal<T: Serialize>(
        &self,
        value: &T,
        key: &SymmetricKey,
    ) -> Result<cachet_crypto::EncryptedData, BoxingError> {
        let encoded = codec::encode(value)?;
        Ok(secretbox::seal(&encoded, key)?)
    }

    /// Fetch the latest merkle root snapshot.
    ///
    /// Returns `None` when the tracker has not observed a root yet; the
    /// header simply goes out without a snapshot.
    pub(crate) async fn latest_merkle_root(&self) -> Result<Option<MerkleRoot>, BoxingError> {
        let root = self.merkle_client.last_root_info().await?;
        if root.is_none() {
            debug!("no merkle root available for chat header");
        }
        Ok(root)
    }

    /// Export a permanent unbox failure as the message's stored record.
    pub(crate) fn make_error_record(
        &self,
        msg: &MessageBoxed,
        err: &UnboxingError,
    ) -> MessageUnboxedError {
        MessageUnboxedError {
            err_type: err.export_kind(),
            err_msg: err.to_string(),
            message_id: msg.message_id(),
            message_type: msg.message_type(),
            ctime: msg.ctime(),
        }
    }
}

impl std::fmt::Debug for Boxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Boxer").finish_non_exhaustive()
    }
}
