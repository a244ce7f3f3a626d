//! Fake collaborators for exercising the boxing pipelines.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cachet_crypto::{Hash, Kid, SigningKeyPair, SymmetricKey};
use cachet_protocol::{
    Boxer, BodyHashChecker, Collaborators, ConversationId, ConversationIdTriple, CryptKey,
    CryptKeysResult, DeviceId, KeyFinder, KeyFinderError, KidCheck, LoaderError, MerkleClient,
    MerkleError, MerkleRoot, MessageBody, MessageBoxed, MessageClientHeader, MessageId,
    MessagePlaintext, MessageServerHeader, MessageType, PrevChecker, ReplayError, SenderInfo,
    Time, TlfId, Uid, UserLoader,
};

pub struct FakeKeyFinder {
    pub canonical_name: String,
    pub keys: Vec<CryptKey>,
    pub fail: Option<KeyFinderError>,
}

impl FakeKeyFinder {
    pub fn with_keys(canonical_name: &str, keys: Vec<CryptKey>) -> Arc<Self> {
        Arc::new(Self {
            canonical_name: canonical_name.to_string(),
            keys,
            fail: None,
        })
    }

    pub fn failing(err: KeyFinderError) -> Arc<Self> {
        Arc::new(Self {
            canonical_name: String::new(),
            keys: vec![],
            fail: Some(err),
        })
    }
}

#[async_trait]
impl KeyFinder for FakeKeyFinder {
    async fn find(&self, _tlf_name: &str, _public: bool) -> Result<CryptKeysResult, KeyFinderError> {
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        Ok(CryptKeysResult {
            canonical_name: self.canonical_name.clone(),
            crypt_keys: self.keys.clone(),
        })
    }
}

pub struct FakeUserLoader {
    pub username: String,
    pub device_name: String,
    pub device_type: String,
    pub fail_device_lookup: bool,
    pub fail_username_lookup: bool,
    pub kid_check: KidCheck,
    pub fail_kid_check: Option<LoaderError>,
}

impl Default for FakeUserLoader {
    fn default() -> Self {
        Self {
            username: "alice".to_string(),
            device_name: "work laptop".to_string(),
            device_type: "desktop".to_string(),
            fail_device_lookup: false,
            fail_username_lookup: false,
            kid_check: KidCheck {
                found: true,
                revoked_at: None,
                deleted: false,
            },
            fail_kid_check: None,
        }
    }
}

#[async_trait]
impl UserLoader for FakeUserLoader {
    async fn lookup_username_and_device(
        &self,
        _uid: &Uid,
        _device_id: &DeviceId,
    ) -> Result<SenderInfo, LoaderError> {
        if self.fail_device_lookup {
            return Err(LoaderError::NotFound);
        }
        Ok(SenderInfo {
            username: self.username.clone(),
            device_name: self.device_name.clone(),
            device_type: self.device_type.clone(),
        })
    }

    async fn lookup_username(&self, _uid: &Uid) -> Result<String, LoaderError> {
        if self.fail_username_lookup {
            return Err(LoaderError::NotFound);
        }
        Ok(self.username.clone())
    }

    async fn check_kid_for_uid(&self, _uid: &Uid, _kid: &Kid) -> Result<KidCheck, LoaderError> {
        if let Some(err) = &self.fail_kid_check {
            return Err(err.clone());
        }
        Ok(self.kid_check.clone())
    }
}

pub struct FakeMerkleClient {
    pub root: Option<MerkleRoot>,
    pub fail: bool,
}

impl FakeMerkleClient {
    pub fn with_root() -> Arc<Self> {
        Arc::new(Self {
            root: Some(MerkleRoot {
                seqno: 1234,
                hash: vec![0xAB; 32],
            }),
            fail: false,
        })
    }
}

#[async_trait]
impl MerkleClient for FakeMerkleClient {
    async fn last_root_info(&self) -> Result<Option<MerkleRoot>, MerkleError> {
        if self.fail {
            return Err(MerkleError::Backend("merkle backend down".to_string()));
        }
        Ok(self.root.clone())
    }
}

/// A body-hash index over a shared map: first writer wins, duplicate hash
/// under a different message id is a replay.
pub fn recording_body_hash_checker() -> BodyHashChecker {
    let seen: Mutex<HashMap<(Vec<u8>, [u8; 32]), MessageId>> = Mutex::new(HashMap::new());
    Arc::new(move |hash: &Hash, msg_id: MessageId, conv_id: &ConversationId| {
        let mut seen = seen.lock().expect("body hash index poisoned");
        let key = (conv_id.as_bytes().to_vec(), hash.to_bytes());
        match seen.get(&key) {
            Some(prior) if *prior != msg_id => Err(ReplayError::ReplayedBodyHash {
                message_id: msg_id,
                prior_id: *prior,
            }),
            _ => {
                seen.insert(key, msg_id);
                Ok(())
            }
        }
    })
}

/// A header-hash index over a shared map: a message id observed with two
/// different hashes is an inconsistency.
pub fn recording_prev_checker() -> PrevChecker {
    let seen: Mutex<HashMap<(Vec<u8>, MessageId), Hash>> = Mutex::new(HashMap::new());
    Arc::new(move |msg_id: MessageId, conv_id: &ConversationId, hash: &Hash| {
        let mut seen = seen.lock().expect("header hash index poisoned");
        let key = (conv_id.as_bytes().to_vec(), msg_id);
        match seen.get(&key) {
            Some(prior) if prior != hash => Err(ReplayError::InconsistentHash {
                message_id: msg_id,
                seen: prior.to_hex(),
                now: hash.to_hex(),
            }),
            _ => {
                seen.insert(key, hash.clone());
                Ok(())
            }
        }
    })
}

pub struct TestWorld {
    pub boxer: Boxer,
    pub signing_key: SigningKeyPair,
    pub conv_id: ConversationId,
    pub crypt_key: CryptKey,
}

/// A boxer over one folder key, a healthy user loader, and recording
/// replay indexes.
pub fn test_world() -> TestWorld {
    let crypt_key = CryptKey::new(2, SymmetricKey::generate());
    world_with(
        FakeKeyFinder::with_keys("alice,bob", vec![crypt_key.clone()]),
        Arc::new(FakeUserLoader::default()),
    )
}

pub fn world_with(key_finder: Arc<FakeKeyFinder>, user_loader: Arc<FakeUserLoader>) -> TestWorld {
    let crypt_key = key_finder
        .keys
        .first()
        .cloned()
        .unwrap_or_else(|| CryptKey::new(1, SymmetricKey::generate()));
    let boxer = Boxer::new(Collaborators {
        key_finder,
        user_loader,
        merkle_client: FakeMerkleClient::with_root(),
        body_hash_checker: recording_body_hash_checker(),
        prev_checker: recording_prev_checker(),
    });
    TestWorld {
        boxer,
        signing_key: SigningKeyPair::generate(),
        conv_id: ConversationId::new(vec![0x11; 8]),
        crypt_key,
    }
}

pub fn sample_plaintext(text: &str) -> MessagePlaintext {
    MessagePlaintext {
        client_header: MessageClientHeader {
            conv: ConversationIdTriple {
                tlf_id: TlfId::new(vec![0x01; 16]),
                topic_type: Default::default(),
                topic_id: vec![0x02; 16],
            },
            tlf_name: "bob,alice".to_string(),
            tlf_public: false,
            message_type: MessageType::Text,
            prev: vec![],
            sender: Uid::new(vec![0xAA; 16]),
            sender_device: DeviceId::new(vec![0xBB; 16]),
            merkle_root: None,
            outbox_id: None,
            outbox_info: None,
        },
        message_body: MessageBody::text(text),
    }
}

/// Simulate relay acceptance: attach a server header.
pub fn deliver(mut boxed: MessageBoxed, message_id: u64, ctime_ms: i64) -> MessageBoxed {
    boxed.server_header = Some(MessageServerHeader {
        message_id: MessageId(message_id),
        ctime: Time::from_millis(ctime_ms),
        superseded_by: MessageId(0),
    });
    boxed
}
