//! Identifiers and metadata records shared across the boxing pipelines.

use serde::{Deserialize, Serialize};

use cachet_crypto::Hash;

/// Milliseconds since the Unix epoch, as assigned by the relay server.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Time(pub i64);

impl Time {
    /// The zero time. Deleted senders are reported as revoked since epoch.
    pub const EPOCH: Time = Time(0);

    /// Construct from milliseconds since the Unix epoch.
    pub fn from_millis(ms: i64) -> Self {
        Time(ms)
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Whether this is the zero time.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether this time is strictly after `other`.
    pub fn after(&self, other: Time) -> bool {
        self.0 > other.0
    }
}

/// Server-assigned message sequence number, monotonic per conversation.
///
/// Zero is the nil id: an unset supersession pointer, or an envelope that
/// has not yet been assigned a server header.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Whether this is the nil id.
    pub fn is_nil(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

macro_rules! byte_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(#[serde(with = "serde_bytes")] Vec<u8>);

        impl $name {
            /// Wrap raw identifier bytes.
            pub fn new(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            /// The identifier bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Format as a lowercase hex string.
            pub fn to_hex(&self) -> String {
                self.0.iter().map(|b| format!("{:02x}", b)).collect()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({}...)"), hex_prefix(&self.0))
            }
        }
    };
}

byte_id! {
    /// Opaque conversation identifier assigned by the relay.
    ConversationId
}

byte_id! {
    /// Identifier of a team folder's key hierarchy.
    TlfId
}

byte_id! {
    /// A user identifier.
    Uid
}

byte_id! {
    /// A device identifier within a user's account.
    DeviceId
}

byte_id! {
    /// Client-chosen id correlating an outbound message with its local
    /// outbox record.
    OutboxId
}

/// The kind of traffic a conversation topic carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicType {
    /// Ordinary chat messages.
    #[default]
    Chat,
    /// Developer/system traffic.
    Dev,
}

/// The triple that names a conversation: folder, topic kind, topic id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationIdTriple {
    /// The team folder the conversation lives in.
    pub tlf_id: TlfId,
    /// The kind of traffic.
    pub topic_type: TopicType,
    /// Opaque topic identifier.
    #[serde(with = "serde_bytes")]
    pub topic_id: Vec<u8>,
}

/// The kind of payload a message carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// No payload kind set.
    #[default]
    Unspecified,
    /// A text message.
    Text,
    /// An attachment.
    Attachment,
    /// An edit of an earlier message.
    Edit,
    /// A deletion of earlier messages.
    Delete,
    /// Conversation metadata change.
    Metadata,
    /// A conversation headline change.
    Headline,
}

/// A pointer asserting the identity of a prior message.
///
/// Each new message embeds the ids and header hashes of messages it has
/// seen, building a tamper-evident history chain that the unboxer checks
/// against its consistency index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePreviousPointer {
    /// The earlier message's server-assigned id.
    pub id: MessageId,
    /// The earlier message's header ciphertext hash.
    pub hash: Hash,
}

/// Snapshot of the identity-server merkle tree, embedded at boxing time
/// for later auditability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleRoot {
    /// Sequence number of the root.
    pub seqno: i64,
    /// Root hash bytes.
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
}

/// Local ordering info carried for outbox reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxInfo {
    /// The latest message id known when the message was composed.
    pub prev: MessageId,
    /// Local composition time.
    pub compose_time: Time,
}

/// Message metadata supplied by the sending client.
///
/// Carried in cleartext alongside the ciphertexts: the relay needs the
/// sender and device fields for authorization, and the receiving client
/// needs the TLF name before it can fetch keys. The authoritative copy of
/// these fields lives inside the sealed, signed header plaintext.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageClientHeader {
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
    /// Merkle tree snapshot taken at boxing time.
    pub merkle_root: Option<MerkleRoot>,
    /// Outbox correlation id.
    pub outbox_id: Option<OutboxId>,
    /// Outbox ordering info.
    pub outbox_info: Option<OutboxInfo>,
}

impl MessageClientHeader {
    /// The TLF name with any reset-account suffix applied.
    ///
    /// Conversations whose folder went through an account reset carry
    /// finalize info; the historical suffix must be part of the name used
    /// for key lookup or the resolver will return the wrong hierarchy.
    pub fn tlf_name_expanded(&self, finalize: Option<&ConversationFinalizeInfo>) -> String {
        match finalize {
            Some(info) => info.expand_tlf_name(&self.tlf_name),
            None => self.tlf_name.clone(),
        }
    }
}

/// Fields assigned by the relay when it accepts a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageServerHeader {
    /// Monotonic message id within the conversation.
    pub message_id: MessageId,
    /// Server-assigned creation time.
    pub ctime: Time,
    /// Id of the message that superseded this one; nil if none.
    pub superseded_by: MessageId,
}

/// Reset-account history for a finalized conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationFinalizeInfo {
    /// The user whose account was reset.
    pub reset_user: String,
    /// Date of the reset, as rendered in the folder suffix.
    pub reset_date: String,
    /// The full rendered suffix.
    pub reset_full: String,
}

impl ConversationFinalizeInfo {
    /// Build finalize info, rendering the folder suffix.
    pub fn new(reset_user: impl Into<String>, reset_date: impl Into<String>) -> Self {
        let reset_user = reset_user.into();
        let reset_date = reset_date.into();
        let reset_full = format!("(files before {} account reset {})", reset_user, reset_date);
        Self {
            reset_user,
            reset_date,
            reset_full,
        }
    }

    /// Append the reset suffix to `name` unless it is already present.
    pub fn expand_tlf_name(&self, name: &str) -> String {
        if self.reset_full.is_empty() || name.contains(self.reset_full.as_str()) {
            return name.to_string();
        }
        format!("{} {}", name, self.reset_full)
    }
}

/// Cursor state carried alongside a page of thread messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Cursor for the next page.
    #[serde(with = "serde_bytes")]
    pub next: Vec<u8>,
    /// Cursor for the previous page.
    #[serde(with = "serde_bytes")]
    pub previous: Vec<u8>,
    /// Requested page size.
    pub num: u32,
    /// Whether this is the last page.
    pub last: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_after() {
        assert!(Time(100).after(Time(99)));
        assert!(!Time(100).after(Time(100)));
        assert!(!Time(99).after(Time(100)));
    }

    #[test]
    fn test_message_id_nil() {
        assert!(MessageId(0).is_nil());
        assert!(!MessageId(1).is_nil());
    }

    #[test]
    fn test_byte_id_hex_and_debug() {
        let uid = Uid::new(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(uid.to_hex(), "deadbeef");
        let debug = format!("{:?}", uid);
        assert!(debug.starts_with("Uid("));
    }

    #[test]
    fn test_tlf_name_expanded_without_finalize() {
        let header = MessageClientHeader {
            tlf_name: "alice,bob".to_string(),
            ..Default::default()
        };
        assert_eq!(header.tlf_name_expanded(None), "alice,bob");
    }

    #[test]
    fn test_tlf_name_expanded_with_finalize() {
        let header = MessageClientHeader {
            tlf_name: "alice,bob".to_string(),
            ..Default::default()
        };
        let finalize = ConversationFinalizeInfo::new("bob", "2016-08-30");
        let expanded = header.tlf_name_expanded(Some(&finalize));
        assert_eq!(
            expanded,
            "alice,bob (files before bob account reset 2016-08-30)"
        );
    }

    #[test]
    fn test_tlf_name_expansion_is_idempotent() {
        let finalize = ConversationFinalizeInfo::new("bob", "2016-08-30");
        let once = finalize.expand_tlf_name("alice,bob");
        let twice = finalize.expand_tlf_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_client_header_serialization_roundtrip() {
        let header = MessageClientHeader {
            conv: ConversationIdTriple {
                tlf_id: TlfId::new(vec![1, 2, 3]),
                topic_type: TopicType::Chat,
                topic_id: vec![9, 9],
            },
            tlf_name: "alice,bob".to_string(),
            tlf_public: false,
            message_type: MessageType::Text,
            prev: vec![MessagePreviousPointer {
                id: MessageId(4),
                hash: Hash::sha256_v1(b"prior header"),
            }],
            sender: Uid::new(vec![7; 16]),
            sender_device: DeviceId::new(vec![8; 16]),
            merkle_root: Some(MerkleRoot {
                seqno: 1234,
                hash: vec![0xAB; 32],
            }),
            outbox_id: Some(OutboxId::new(vec![1; 8])),
            outbox_info: Some(OutboxInfo {
                prev: MessageId(3),
                compose_time: Time(1_500_000_000_000),
            }),
        };

        let bytes = crate::codec::encode(&header).unwrap();
        let restored: MessageClientHeader = crate::codec::decode(&bytes).unwrap();
        assert_eq!(header, restored);
    }
}
