//! # cachet-protocol
//!
//! Envelope records and the box/unbox pipelines for the cachet message
//! sealing core.
//!
//! Outgoing messages are *boxed*: the body is encoded and sealed, its
//! ciphertext hash is bound into the header, the header is signed with the
//! sender's device key and sealed in turn. Incoming envelopes are
//! *unboxed*: opened, decoded, and verified against the header/body
//! binding, the header signature, the signer's key timeline, and the
//! conversation's replay and history-consistency indexes.
//!
//! ## Architecture
//!
//! ```text
//! box:    plaintext -> encode body -> seal -> hash ciphertext
//!           -> header(+body hash) -> sign -> encode -> seal -> envelope
//!
//! unbox:  envelope -> resolve key by generation -> open -> decode
//!           -> version dispatch -> body-hash check -> signature check
//!           -> sender key validity -> replay/prev checks -> record
//! ```
//!
//! The [`Boxer`] holds its collaborators (key finder, user loader, merkle
//! client, replay checkers) as an explicit bundle; tests substitute fakes.
//!
//! ## Error discipline
//!
//! Unboxing distinguishes *permanent* failures, which become stored
//! [`MessageUnboxedError`] records, from *transient* ones, which abort the
//! operation so the caller can retry with fresher key or user state. See
//! [`UnboxingError`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod body;
pub mod boxer;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod header;
pub mod keys;
pub mod resolver;
pub mod types;
pub mod unbox;
pub mod unboxed;
pub mod version;

pub use body::{BodyPlaintext, BodyPlaintextV1, MessageBody};
pub use boxer::{Boxer, Collaborators, SIGNATURE_PREFIX_CHAT};
pub use envelope::{MessageBoxed, MessagePlaintext};
pub use error::{BoxingError, UnboxErrorKind, UnboxingError};
pub use guard::{
    noop_body_hash_checker, noop_prev_checker, BodyHashChecker, PrevChecker, ReplayError,
};
pub use header::{HeaderPlaintext, HeaderPlaintextV1};
pub use keys::{public_crypt_key, CryptKey, CryptKeysResult, PUBLIC_KEY_GENERATION};
pub use resolver::{
    KeyFinder, KeyFinderError, KidCheck, LoaderError, MerkleClient, MerkleError, SenderInfo,
    UserLoader,
};
pub use types::{
    ConversationFinalizeInfo, ConversationId, ConversationIdTriple, DeviceId, MerkleRoot,
    MessageClientHeader, MessageId, MessagePreviousPointer, MessageServerHeader, MessageType,
    OutboxId, OutboxInfo, Pagination, Time, TlfId, TopicType, Uid,
};
pub use unboxed::{
    MessageUnboxed, MessageUnboxedError, MessageUnboxedValid, ThreadView, ThreadViewBoxed,
};
