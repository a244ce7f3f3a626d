//! Replay and history-consistency checkers.
//!
//! The relay is untrusted: it could replay an old envelope under a new
//! message id, or serve different participants different histories. Two
//! externally-maintained indexes defend against that, consulted and
//! updated through the checker callbacks here:
//!
//! - the *body hash* index enforces that a body ciphertext hash appears at
//!   most once per conversation (first writer wins);
//! - the *header hash* index enforces that every observed `(message id,
//!   header hash)` pair, whether from an unboxed message or from a prev
//!   pointer inside one, agrees with every other observation.
//!
//! Body-hash uniqueness is enforced separately from header-hash
//! uniqueness because Ed25519 signatures may be malleable: with the shared
//! encryption key, an attacker could twiddle a signature into a different
//! valid signature over the same plaintext and re-seal, minting a fresh
//! header hash. The body hash is over signed content and derives from a
//! random nonce, so it cannot be regenerated that way.
//!
//! A checker call must be atomic: check-and-record under one lock.
//! Within a conversation, callers serialize unboxing so first-writer-wins
//! is well defined.

use std::sync::Arc;

use thiserror::Error;

use cachet_crypto::Hash;

use crate::types::{ConversationId, MessageId};

/// A violation reported by a replay or consistency index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// A body ciphertext hash was seen before in this conversation.
    #[error("body hash of message {message_id} already recorded for message {prior_id}")]
    ReplayedBodyHash {
        /// The message now being unboxed.
        message_id: MessageId,
        /// The message that first carried this body hash.
        prior_id: MessageId,
    },

    /// A message id was previously observed with a different header hash.
    #[error("message {message_id} seen with header hash {seen}, now {now}")]
    InconsistentHash {
        /// The disputed message id.
        message_id: MessageId,
        /// Hex of the hash recorded earlier.
        seen: String,
        /// Hex of the hash observed now.
        now: String,
    },

    /// The index store itself failed.
    #[error("replay index failure: {0}")]
    Store(String),
}

/// Checks and records a body ciphertext hash for a message.
pub type BodyHashChecker =
    Arc<dyn Fn(&Hash, MessageId, &ConversationId) -> Result<(), ReplayError> + Send + Sync>;

/// Checks and records a `(message id, header hash)` observation.
pub type PrevChecker =
    Arc<dyn Fn(MessageId, &ConversationId, &Hash) -> Result<(), ReplayError> + Send + Sync>;

/// A body-hash checker that accepts everything. For callers that keep no
/// replay index.
pub fn noop_body_hash_checker() -> BodyHashChecker {
    Arc::new(|_, _, _| Ok(()))
}

/// A prev checker that accepts everything. For callers that keep no
/// consistency index.
pub fn noop_prev_checker() -> PrevChecker {
    Arc::new(|_, _, _| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_checkers_accept() {
        let body = noop_body_hash_checker();
        let prev = noop_prev_checker();
        let conv = ConversationId::new(vec![1]);
        let hash = Hash::sha256_v1(b"x");

        assert!(body(&hash, MessageId(1), &conv).is_ok());
        assert!(prev(MessageId(1), &conv, &hash).is_ok());
    }

    #[test]
    fn test_replay_error_messages_name_the_conflict() {
        let err = ReplayError::InconsistentHash {
            message_id: MessageId(4),
            seen: "aa".into(),
            now: "bb".into(),
        };
        let text = err.to_string();
        assert!(text.contains("message 4"));
        assert!(text.contains("aa"));
        assert!(text.contains("bb"));
    }
}
