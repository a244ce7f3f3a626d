//! The unbox pipeline: opening, verifying, and classifying envelopes.
//!
//! Unboxing proves, to the extent possible client-side, that an envelope
//! was produced by the claimed sender's device at the claimed time, and
//! that the relay has not replayed, reordered, or swapped message bodies.
//! Failures split into permanent ones, exported as stored error records,
//! and transient ones, which abort the call for a later retry. See
//! [`crate::error`] for the rules.

use tracing::{debug, warn};

use cachet_crypto::{secretbox, verify, Kid, SignatureInfo, SymmetricKey};

use crate::body::{BodyPlaintext, MessageBody};
use crate::boxer::{Boxer, SIGNATURE_PREFIX_CHAT};
use crate::codec;
use crate::envelope::MessageBoxed;
use crate::error::UnboxingError;
use crate::header::{HeaderPlaintext, HeaderPlaintextV1};
use crate::keys::CryptKey;
use crate::types::{
    ConversationFinalizeInfo, ConversationId, MessageClientHeader, MessageServerHeader, Time, Uid,
};
use crate::unboxed::{MessageUnboxed, MessageUnboxedValid, ThreadView, ThreadViewBoxed};

use cachet_crypto::{EncryptedData, Hash};

/// Fields recovered by opening an envelope with a specific key.
struct UnboxedWithKey {
    client_header: MessageClientHeader,
    server_header: MessageServerHeader,
    message_body: Option<MessageBody>,
    body_hash: Hash,
    header_hash: Hash,
    header_signature: Option<SignatureInfo>,
    sender_device_revoked_at: Option<Time>,
}

/// Outcome of the signature and key-validity checks.
struct VerifiedHeader {
    sender_device_revoked_at: Option<Time>,
}

/// Where a signing key sits on its owner's timeline at a given ctime.
struct SenderKeyStatus {
    found: bool,
    valid_at_ctime: bool,
    revoked_at: Option<Time>,
}

/// The body ciphertext, opened or recognized as tombstoned.
enum OpenedBody {
    Tombstoned,
    Present(BodyPlaintext),
}

impl Boxer {
    /// Verify and open one envelope.
    ///
    /// Returns `Ok(MessageUnboxed::Valid(_))` for a verified message,
    /// `Ok(MessageUnboxed::Error(_))` when the envelope is permanently
    /// bad (the record is its stored representation), and `Err(_)` only
    /// for transient failures the caller should retry.
    pub async fn unbox_message(
        &self,
        boxed: MessageBoxed,
        conv_id: &ConversationId,
        finalize: Option<&ConversationFinalizeInfo>,
    ) -> Result<MessageUnboxed, UnboxingError> {
        let tlf_name = boxed.client_header.tlf_name_expanded(finalize);
        let tlf_public = boxed.client_header.tlf_public;

        // Rekey errors come through here; all of these are transient.
        let keys = self.key_finder.find(&tlf_name, tlf_public).await?;

        let match_key = keys
            .crypt_keys
            .iter()
            .find(|key| key.generation == boxed.key_generation)
            .ok_or(UnboxingError::NoKeyForGeneration {
                generation: boxed.key_generation,
            })?;

        let opened = match self.unbox_message_with_key(&boxed, match_key).await {
            Ok(opened) => opened,
            Err(err) => {
                debug!(
                    message_id = boxed.message_id().0,
                    error = %err,
                    "failed to unbox message"
                );
                if err.is_permanent() {
                    return Ok(MessageUnboxed::Error(self.make_error_record(&boxed, &err)));
                }
                return Err(err);
            }
        };

        let server_header = opened.server_header.clone();

        let (sender_username, sender_device_name, sender_device_type) =
            self.sender_info(&opened.client_header).await;

        // Enforce body-hash uniqueness, then record it. First writer wins:
        // a replay served later under a fresh message id is the loser.
        if let Err(replay_err) =
            (self.body_hash_checker)(&opened.body_hash, server_header.message_id, conv_id)
        {
            warn!(
                message_id = server_header.message_id.0,
                error = %replay_err,
                "found a replayed body hash"
            );
            let err = UnboxingError::ReplayedBodyHash(replay_err);
            return Ok(MessageUnboxed::Error(self.make_error_record(&boxed, &err)));
        }

        // Enforce that this header hash, and every prev pointer the
        // message asserts, agree with all earlier observations.
        if let Err(prev_err) =
            (self.prev_checker)(server_header.message_id, conv_id, &opened.header_hash)
        {
            warn!(
                message_id = server_header.message_id.0,
                error = %prev_err,
                "found an inconsistent header hash"
            );
            let err = UnboxingError::InconsistentHeaderHash(prev_err);
            return Ok(MessageUnboxed::Error(self.make_error_record(&boxed, &err)));
        }
        for prev_ptr in &opened.client_header.prev {
            if let Err(prev_err) = (self.prev_checker)(prev_ptr.id, conv_id, &prev_ptr.hash) {
                warn!(
                    message_id = server_header.message_id.0,
                    prev_id = prev_ptr.id.0,
                    error = %prev_err,
                    "found an inconsistent prev pointer"
                );
                let err = UnboxingError::InconsistentHeaderHash(prev_err);
                return Ok(MessageUnboxed::Error(self.make_error_record(&boxed, &err)));
            }
        }

        Ok(MessageUnboxed::Valid(MessageUnboxedValid {
            client_header: opened.client_header,
            server_header,
            message_body: opened.message_body,
            sender_username,
            sender_device_name,
            sender_device_type,
            body_hash: opened.body_hash,
            header_hash: opened.header_hash,
            header_signature: opened.header_signature,
            sender_device_revoked_at: opened.sender_device_revoked_at,
        }))
    }

    /// Unbox a batch serially, preserving order.
    ///
    /// Permanent failures become error records in place; a transient
    /// failure aborts the batch. Callers must serialize batches within a
    /// conversation so the replay indexes see a single writer.
    pub async fn unbox_messages(
        &self,
        boxed: Vec<MessageBoxed>,
        conv_id: &ConversationId,
        finalize: Option<&ConversationFinalizeInfo>,
    ) -> Result<Vec<MessageUnboxed>, UnboxingError> {
        let mut unboxed = Vec::with_capacity(boxed.len());
        for msg in boxed {
            unboxed.push(self.unbox_message(msg, conv_id, finalize).await?);
        }
        Ok(unboxed)
    }

    /// Unbox a page of thread messages, passing pagination through.
    pub async fn unbox_thread(
        &self,
        boxed: ThreadViewBoxed,
        conv_id: &ConversationId,
        finalize: Option<&ConversationFinalizeInfo>,
    ) -> Result<ThreadView, UnboxingError> {
        Ok(ThreadView {
            messages: self
                .unbox_messages(boxed.messages, conv_id, finalize)
                .await?,
            pagination: boxed.pagination,
        })
    }

    /// Open and verify one envelope with a resolved key.
    async fn unbox_message_with_key(
        &self,
        msg: &MessageBoxed,
        key: &CryptKey,
    ) -> Result<UnboxedWithKey, UnboxingError> {
        let server_header = msg
            .server_header
            .as_ref()
            .ok_or(UnboxingError::MissingServerHeader)?;

        let header_hash = (self.hash_v1)(&msg.header_ciphertext.ciphertext);

        // An empty body ciphertext is only legitimate for a message whose
        // body was tombstoned by supersession; its hash checks are skipped
        // because there is nothing left to verify against.
        let skip_body_verification;
        let opened_body = if msg.body_ciphertext.ciphertext.is_empty() {
            if server_header.superseded_by.is_nil() {
                return Err(UnboxingError::EmptyBodyNotSuperseded);
            }
            skip_body_verification = true;
            OpenedBody::Tombstoned
        } else {
            skip_body_verification = false;
            let packed_body = self.open(&msg.body_ciphertext, key.key())?;
            OpenedBody::Present(codec::decode(&packed_body)?)
        };

        let packed_header = self.open(&msg.header_ciphertext, key.key())?;
        let header: HeaderPlaintext = codec::decode(&packed_header)?;

        let verified = self
            .verify_message(&header, msg, skip_body_verification)
            .await?;

        let (client_header, header_signature, body_hash) = match header {
            HeaderPlaintext::V1(hp) => {
                let signature = hp.header_signature.clone();
                let body_hash = hp.body_hash.clone();
                (client_header_from_v1(hp), signature, body_hash)
            }
            HeaderPlaintext::Unsupported(u) => {
                return Err(UnboxingError::HeaderVersion {
                    version: u.version,
                    critical: u.critical,
                })
            }
        };

        let message_body = match opened_body {
            OpenedBody::Tombstoned => None,
            OpenedBody::Present(BodyPlaintext::V1(body)) => Some(body.message_body),
            OpenedBody::Present(BodyPlaintext::Unsupported(u)) => {
                return Err(UnboxingError::BodyVersion {
                    version: u.version,
                    critical: u.critical,
                })
            }
        };

        Ok(UnboxedWithKey {
            client_header,
            server_header: server_header.clone(),
            message_body,
            body_hash,
            header_hash,
            header_signature,
            sender_device_revoked_at: verified.sender_device_revoked_at,
        })
    }

    /// Dispatch verification on the header version.
    async fn verify_message(
        &self,
        header: &HeaderPlaintext,
        msg: &MessageBoxed,
        skip_body_verification: bool,
    ) -> Result<VerifiedHeader, UnboxingError> {
        match header {
            HeaderPlaintext::V1(hp) => {
                self.verify_header_v1(hp, msg, skip_body_verification).await
            }
            HeaderPlaintext::Unsupported(u) => Err(UnboxingError::HeaderVersion {
                version: u.version,
                critical: u.critical,
            }),
        }
    }

    /// Check the body hash, the header signature, and the signing key's
    /// validity at the message's server ctime.
    async fn verify_header_v1(
        &self,
        header: &HeaderPlaintextV1,
        msg: &MessageBoxed,
        skip_body_verification: bool,
    ) -> Result<VerifiedHeader, UnboxingError> {
        if !skip_body_verification {
            // Hash equality is constant-time; see cachet_crypto::Hash.
            let body_hash = (self.hash_v1)(&msg.body_ciphertext.ciphertext);
            if body_hash != header.body_hash {
                return Err(UnboxingError::BodyHashMismatch);
            }
        }

        let signature = header
            .header_signature
            .as_ref()
            .ok_or(UnboxingError::MissingHeaderSignature)?;
        if !verify(&header.signing_payload()?, signature, SIGNATURE_PREFIX_CHAT) {
            return Err(UnboxingError::BadSignature);
        }

        let server_header = msg
            .server_header
            .as_ref()
            .ok_or(UnboxingError::MissingServerHeader)?;
        let status = self
            .valid_sender_key(&header.sender, &signature.kid, server_header.ctime)
            .await?;
        if !status.found {
            return Err(UnboxingError::SenderKeyNotFound);
        }
        if !status.valid_at_ctime {
            return Err(UnboxingError::SenderKeyInvalidAtCtime);
        }

        Ok(VerifiedHeader {
            sender_device_revoked_at: status.revoked_at,
        })
    }

    /// Check that `kid` was an active key for `sender` at `ctime`.
    ///
    /// The ctime is server-supplied, so a colluding relay could backdate a
    /// message to before a revocation; that is out of scope here. A
    /// deleted account reports its key as revoked since epoch so every
    /// message from it is labeled suspect while remaining displayable.
    async fn valid_sender_key(
        &self,
        sender: &Uid,
        kid: &Kid,
        ctime: Time,
    ) -> Result<SenderKeyStatus, UnboxingError> {
        let check = self
            .user_loader
            .check_kid_for_uid(sender, kid)
            .await
            .map_err(UnboxingError::UserLoader)?;

        if !check.found {
            return Ok(SenderKeyStatus {
                found: false,
                valid_at_ctime: false,
                revoked_at: None,
            });
        }

        if check.deleted {
            debug!(sender = %sender.to_hex(), kid = %kid.to_hex(), "sender key was deleted");
            return Ok(SenderKeyStatus {
                found: true,
                valid_at_ctime: true,
                revoked_at: Some(Time::EPOCH),
            });
        }

        let mut valid_at_ctime = true;
        let mut revoked_at = None;
        if let Some(revoked) = check.revoked_at {
            if revoked.is_zero() {
                return Err(UnboxingError::ZeroRevocationTime);
            }
            revoked_at = Some(revoked);
            valid_at_ctime = revoked.after(ctime);
        }

        Ok(SenderKeyStatus {
            found: true,
            valid_at_ctime,
            revoked_at,
        })
    }

    /// Resolve sender display metadata, degrading gracefully.
    ///
    /// A failed device lookup falls back to username only; a failed
    /// username lookup leaves the fields empty. Metadata is cosmetic and
    /// never fails the unbox.
    async fn sender_info(&self, header: &MessageClientHeader) -> (String, String, String) {
        match self
            .user_loader
            .lookup_username_and_device(&header.sender, &header.sender_device)
            .await
        {
            Ok(info) => (info.username, info.device_name, info.device_type),
            Err(err) => {
                debug!(
                    sender = %header.sender.to_hex(),
                    device = %header.sender_device.to_hex(),
                    error = %err,
                    "unable to fetch sender and device information"
                );
                match self.user_loader.lookup_username(&header.sender).await {
                    Ok(username) => (username, String::new(), String::new()),
                    Err(err) => {
                        debug!(error = %err, "failed to fetch sender username after initial error");
                        (String::new(), String::new(), String::new())
                    }
                }
            }
        }
    }

    /// Open sealed data with a symmetric key.
    fn open(&self, data: &EncryptedData, key: &SymmetricKey) -> Result<Vec<u8>, UnboxingError> {
        Ok(secretbox::open(data, key)?)
    }
}

/// Rebuild the client header from the authenticated header plaintext.
///
/// The merkle root is not part of the V1 header plaintext, so the
/// recovered header carries none.
fn client_header_from_v1(hp: HeaderPlaintextV1) -> MessageClientHeader {
    MessageClientHeader {
        conv: hp.conv,
        tlf_name: hp.tlf_name,
        tlf_public: hp.tlf_public,
        message_type: hp.message_type,
        prev: hp.prev,
        sender: hp.sender,
        sender_device: hp.sender_device,
        merkle_root: None,
        outbox_id: hp.outbox_id,
        outbox_info: hp.outbox_info,
    }
}
