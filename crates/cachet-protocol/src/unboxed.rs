//! Unboxed message records.
//!
//! Every unbox attempt ends in one of three shapes: a valid record, a
//! stored error record (permanent failure, cached into the timeline), or
//! a transient error that is never persisted. This module holds the first
//! two; see [`crate::error`] for the classification rules.

use serde::{Deserialize, Serialize};

use cachet_crypto::{Hash, SignatureInfo};

use crate::body::MessageBody;
use crate::error::UnboxErrorKind;
use crate::types::{
    MessageClientHeader, MessageId, MessageServerHeader, MessageType, Pagination, Time,
};

/// A fully verified, decrypted message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageUnboxedValid {
    /// The client header recovered from the sealed, signed header
    /// plaintext (not the relay-visible copy).
    pub client_header: MessageClientHeader,
    /// The relay-assigned fields.
    pub server_header: MessageServerHeader,
    /// The payload; `None` when the body was tombstoned by supersession.
    pub message_body: Option<MessageBody>,
    /// Sender's username, or empty if lookup failed.
    pub sender_username: String,
    /// Sending device's name, or empty if lookup failed.
    pub sender_device_name: String,
    /// Sending device's type, or empty if lookup failed.
    pub sender_device_type: String,
    /// Hash of the body ciphertext, as bound in the header.
    pub body_hash: Hash,
    /// Hash of the header ciphertext.
    pub header_hash: Hash,
    /// The header signature, kept for display and audit.
    pub header_signature: Option<SignatureInfo>,
    /// When the sending device's key was revoked, if it ever was. A
    /// message may verify and still be suspect: revocation after ctime.
    pub sender_device_revoked_at: Option<Time>,
}

/// The stored representation of a permanently failed unbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageUnboxedError {
    /// Classification of the failure.
    pub err_type: UnboxErrorKind,
    /// Human-readable description.
    pub err_msg: String,
    /// The failed message's server-assigned id (nil if never assigned).
    pub message_id: MessageId,
    /// The payload kind claimed by the cleartext header.
    pub message_type: MessageType,
    /// The failed message's server ctime (zero if never assigned).
    pub ctime: Time,
}

/// The outcome of unboxing a single envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MessageUnboxed {
    /// The message verified and decrypted.
    Valid(MessageUnboxedValid),
    /// The message failed permanently; this record is its stored form.
    Error(MessageUnboxedError),
}

impl MessageUnboxed {
    /// Whether this is a valid message.
    pub fn is_valid(&self) -> bool {
        matches!(self, MessageUnboxed::Valid(_))
    }

    /// The valid record, if this is one.
    pub fn as_valid(&self) -> Option<&MessageUnboxedValid> {
        match self {
            MessageUnboxed::Valid(v) => Some(v),
            MessageUnboxed::Error(_) => None,
        }
    }

    /// The error record, if this is one.
    pub fn as_error(&self) -> Option<&MessageUnboxedError> {
        match self {
            MessageUnboxed::Valid(_) => None,
            MessageUnboxed::Error(e) => Some(e),
        }
    }

    /// The server-assigned message id of either outcome.
    pub fn message_id(&self) -> MessageId {
        match self {
            MessageUnboxed::Valid(v) => v.server_header.message_id,
            MessageUnboxed::Error(e) => e.message_id,
        }
    }
}

/// A page of boxed messages as served by the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadViewBoxed {
    /// The boxed messages, newest first.
    pub messages: Vec<crate::envelope::MessageBoxed>,
    /// Cursor state for the page.
    pub pagination: Option<Pagination>,
}

/// A page of unboxed messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadView {
    /// The unboxed messages, in the order they arrived.
    pub messages: Vec<MessageUnboxed>,
    /// Cursor state, passed through from the boxed page.
    pub pagination: Option<Pagination>,
}
