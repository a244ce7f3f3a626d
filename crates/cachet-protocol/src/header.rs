//! The sealed, signed header plaintext.
//!
//! The header plaintext duplicates the client header fields inside the
//! authenticated envelope and binds the body ciphertext to it through
//! `body_hash`. The device signature lives *inside* the record it signs:
//! the signature is computed over the record encoded with
//! `header_signature` set to `None`, then inserted. Verifiers must null
//! the field out again before re-encoding, and the two encodings must be
//! byte-identical; see [`HeaderPlaintextV1::signing_payload`].

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use cachet_crypto::{Hash, SignatureInfo};

use crate::codec;
use crate::types::{
    ConversationIdTriple, DeviceId, MessagePreviousPointer, MessageType, OutboxId, OutboxInfo, Uid,
};
use crate::version::{UnsupportedPlaintext, PLAINTEXT_VERSION_V1};

/// Version 1 of the header plaintext.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeaderPlaintextV1 {
    /// The conversation triple.
    pub conv: ConversationIdTriple,
    /// Name of the team folder.
    pub tlf_name: String,
    /// Whether the conversation is public.
    pub tlf_public: bool,
    /// The kind of payload.
    pub message_type: MessageType,
    /// History chain assertions.
    pub prev: Vec<MessagePreviousPointer>,
    /// The sending user.
    pub sender: Uid,
    /// The sending device.
    pub sender_device: DeviceId,
    /// Hash of the body ciphertext, binding header to body.
    pub body_hash: Hash,
    /// Outbox ordering info.
    pub outbox_info: Option<OutboxInfo>,
    /// Outbox correlation id.
    pub outbox_id: Option<OutboxId>,
    /// Detached signature over this record with the field set to `None`.
    pub header_signature: Option<SignatureInfo>,
}

impl HeaderPlaintextV1 {
    /// Encode this record with the signature field nulled out.
    ///
    /// Both the signer and the verifier reach the signed bytes through
    /// this method, so the encodings agree by construction.
    pub fn signing_payload(&self) -> codec::Result<Vec<u8>> {
        let mut view = self.clone();
        view.header_signature = None;
        codec::encode(&view)
    }
}

/// The version-tagged header plaintext envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderPlaintext {
    /// The processable version.
    V1(HeaderPlaintextV1),
    /// A future version, preserved for re-encoding.
    Unsupported(UnsupportedPlaintext),
}

impl HeaderPlaintext {
    /// The on-wire version tag.
    pub fn version(&self) -> u32 {
        match self {
            HeaderPlaintext::V1(_) => PLAINTEXT_VERSION_V1,
            HeaderPlaintext::Unsupported(u) => u.version,
        }
    }
}

impl Serialize for HeaderPlaintext {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            HeaderPlaintext::V1(v1) => (PLAINTEXT_VERSION_V1, v1).serialize(serializer),
            HeaderPlaintext::Unsupported(u) => (u.version, u.raw()).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for HeaderPlaintext {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (version, raw): (u32, rmpv::Value) = Deserialize::deserialize(deserializer)?;
        if version == PLAINTEXT_VERSION_V1 {
            let v1: HeaderPlaintextV1 =
                rmpv::ext::from_value(raw).map_err(D::Error::custom)?;
            Ok(HeaderPlaintext::V1(v1))
        } else {
            UnsupportedPlaintext::classify(version, raw).map(HeaderPlaintext::Unsupported)
        }
    }
}
