//! Collaborator interfaces for key, user, and merkle resolution.
//!
//! The boxing core never talks to the network itself; it is handed these
//! traits at construction. All of their failure modes are transient from
//! the core's point of view: a later retry against fresher backend state
//! may succeed, so none of them produce stored error records.
//!
//! Implementations may block on I/O. Cancelling the surrounding future
//! cancels the call; an implementation that notices cancellation should
//! return its `Cancelled` error.

use async_trait::async_trait;
use thiserror::Error;

use cachet_crypto::Kid;

use crate::keys::CryptKeysResult;
use crate::types::{DeviceId, MerkleRoot, Time, Uid};

/// Errors from key-hierarchy resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyFinderError {
    /// The folder needs a rekey before its keys can be served.
    #[error("rekey needed for {tlf_name:?}")]
    NeedsRekey {
        /// The folder awaiting rekey.
        tlf_name: String,
    },

    /// The backend failed.
    #[error("key finder backend: {0}")]
    Backend(String),

    /// The lookup was cancelled.
    #[error("key lookup cancelled")]
    Cancelled,
}

/// Resolves a team folder name to its canonical form and key hierarchy.
#[async_trait]
pub trait KeyFinder: Send + Sync {
    /// Resolve keys for `(tlf_name, public)`.
    async fn find(&self, tlf_name: &str, public: bool) -> Result<CryptKeysResult, KeyFinderError>;
}

/// Errors from user and device metadata lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// The user or device is not known to the loader.
    #[error("unknown user or device")]
    NotFound,

    /// The backend failed.
    #[error("user loader backend: {0}")]
    Backend(String),

    /// The lookup was cancelled.
    #[error("user lookup cancelled")]
    Cancelled,
}

/// Resolved sender metadata for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SenderInfo {
    /// The sender's username.
    pub username: String,
    /// The sending device's name.
    pub device_name: String,
    /// The sending device's type, e.g. `desktop` or `mobile`.
    pub device_type: String,
}

/// The result of checking a signing key against a user's key timeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KidCheck {
    /// Whether the key belongs to the user at all.
    pub found: bool,
    /// When the key was revoked, if it ever was.
    pub revoked_at: Option<Time>,
    /// Whether the user's account was deleted outright.
    pub deleted: bool,
}

/// Resolves user and device metadata and key-validity timelines.
#[async_trait]
pub trait UserLoader: Send + Sync {
    /// Look up the username plus device metadata for a sender.
    async fn lookup_username_and_device(
        &self,
        uid: &Uid,
        device_id: &DeviceId,
    ) -> Result<SenderInfo, LoaderError>;

    /// Look up only the username for a sender.
    async fn lookup_username(&self, uid: &Uid) -> Result<String, LoaderError>;

    /// Check whether `kid` belongs to `uid` and where it sits on the
    /// revocation timeline.
    async fn check_kid_for_uid(&self, uid: &Uid, kid: &Kid) -> Result<KidCheck, LoaderError>;
}

/// Errors from merkle root retrieval.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// No merkle client is available in this configuration.
    #[error("no merkle client available")]
    Unavailable,

    /// The backend failed.
    #[error("merkle backend: {0}")]
    Backend(String),
}

/// Provides the latest known identity-tree root snapshot.
#[async_trait]
pub trait MerkleClient: Send + Sync {
    /// The most recent root, or `None` if the tracker has not seen one.
    async fn last_root_info(&self) -> Result<Option<MerkleRoot>, MerkleError>;
}
