//! The boxed message envelope.

use serde::{Deserialize, Serialize};

use cachet_crypto::EncryptedData;

use crate::body::MessageBody;
use crate::types::{MessageClientHeader, MessageId, MessageServerHeader, MessageType, Time};

/// A plaintext message as assembled by the sending client, before boxing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessagePlaintext {
    /// Metadata supplied by the client.
    pub client_header: MessageClientHeader,
    /// The message payload.
    pub message_body: MessageBody,
}

/// The sealed, signed wire representation of a chat message.
///
/// Envelopes are immutable once sealed. Outbound envelopes have no server
/// header; the relay assigns one on acceptance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageBoxed {
    /// Cleartext metadata for the relay and for key lookup.
    pub client_header: MessageClientHeader,
    /// Sealed encoding of the versioned header plaintext.
    pub header_ciphertext: EncryptedData,
    /// Sealed encoding of the versioned body plaintext. Empty ciphertext
    /// bytes mean the body was tombstoned by supersession.
    pub body_ciphertext: EncryptedData,
    /// Relay-assigned fields; `None` on outbound envelopes.
    pub server_header: Option<MessageServerHeader>,
    /// Generation of the symmetric key the envelope was sealed with.
    pub key_generation: u32,
}

impl MessageBoxed {
    /// The server-assigned message id, or the nil id if unassigned.
    pub fn message_id(&self) -> MessageId {
        self.server_header
            .as_ref()
            .map(|h| h.message_id)
            .unwrap_or_default()
    }

    /// The server-assigned creation time, or zero if unassigned.
    pub fn ctime(&self) -> Time {
        self.server_header
            .as_ref()
            .map(|h| h.ctime)
            .unwrap_or_default()
    }

    /// The payload kind claimed by the cleartext client header.
    pub fn message_type(&self) -> MessageType {
        self.client_header.message_type
    }
}
