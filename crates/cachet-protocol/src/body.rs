//! The sealed body plaintext and the message payload union.
//!
//! The boxing core treats the payload opaquely: it encodes, seals, and
//! hashes it, but never interprets the contents beyond the kind tag.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{MessageId, MessageType};
use crate::version::{UnsupportedPlaintext, PLAINTEXT_VERSION_V1};

/// A text message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageText {
    /// The message text.
    pub body: String,
}

/// An attachment descriptor. The attachment bytes travel out of band;
/// the message carries enough to render and fetch them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttachment {
    /// Original filename.
    pub filename: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Opaque fetch handle for the uploaded object.
    #[serde(with = "serde_bytes")]
    pub object_key: Vec<u8>,
}

/// An edit of an earlier message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEdit {
    /// The message being edited.
    pub message_id: MessageId,
    /// Replacement text.
    pub body: String,
}

/// A deletion of earlier messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDelete {
    /// The messages being deleted.
    pub message_ids: Vec<MessageId>,
}

/// A conversation headline change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeadline {
    /// The new headline.
    pub headline: String,
}

/// A conversation metadata change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageConversationMetadata {
    /// The new conversation title.
    pub conversation_title: String,
}

/// The payload union over message kinds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    /// A text message.
    Text(MessageText),
    /// An attachment.
    Attachment(MessageAttachment),
    /// An edit of an earlier message.
    Edit(MessageEdit),
    /// A deletion of earlier messages.
    Delete(MessageDelete),
    /// A conversation headline change.
    Headline(MessageHeadline),
    /// A conversation metadata change.
    Metadata(MessageConversationMetadata),
}

impl MessageBody {
    /// The kind tag of this payload.
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::Text(_) => MessageType::Text,
            MessageBody::Attachment(_) => MessageType::Attachment,
            MessageBody::Edit(_) => MessageType::Edit,
            MessageBody::Delete(_) => MessageType::Delete,
            MessageBody::Headline(_) => MessageType::Headline,
            MessageBody::Metadata(_) => MessageType::Metadata,
        }
    }

    /// Convenience constructor for a text payload.
    pub fn text(body: impl Into<String>) -> Self {
        MessageBody::Text(MessageText { body: body.into() })
    }

    /// The text content, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageBody::Text(t) => Some(&t.body),
            _ => None,
        }
    }
}

/// Version 1 of the body plaintext.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyPlaintextV1 {
    /// The message payload.
    pub message_body: MessageBody,
}

/// The version-tagged body plaintext envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum BodyPlaintext {
    /// The processable version.
    V1(BodyPlaintextV1),
    /// A future version, preserved for re-encoding.
    Unsupported(UnsupportedPlaintext),
}

impl BodyPlaintext {
    /// The on-wire version tag.
    pub fn version(&self) -> u32 {
        match self {
            BodyPlaintext::V1(_) => PLAINTEXT_VERSION_V1,
            BodyPlaintext::Unsupported(u) => u.version,
        }
    }
}

impl Serialize for BodyPlaintext {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            BodyPlaintext::V1(v1) => (PLAINTEXT_VERSION_V1, v1).serialize(serializer),
            BodyPlaintext::Unsupported(u) => (u.version, u.raw()).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for BodyPlaintext {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (version, raw): (u32, rmpv::Value) = Deserialize::deserialize(deserializer)?;
        if version == PLAINTEXT_VERSION_V1 {
            let v1: BodyPlaintextV1 = rmpv::ext::from_value(raw).map_err(D::Error::custom)?;
            Ok(BodyPlaintext::V1(v1))
        } else {
            UnsupportedPlaintext::classify(version, raw).map(BodyPlaintext::Unsupported)
        }
    }
}
