//! Short-lived session keys
//!
//! The issuer is stateless: it mints tokens and encrypts under their keys.
//! Persistence and lookup go through an injected [`SessionStore`], so several
//! service instances can share one backing store.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::crypto::{random_bytes, AeadCipher, DerivedKey};
use crate::error::{CryptoError, Result};

/// Default token lifetime (24 hours)
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Random bytes behind the hex session id
pub const SESSION_ID_LEN: usize = 32;

/// Session id, key and absolute expiry.
///
/// A token past `expires_at` is logically dead even while a store still
/// holds it.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub session_id: String,
    #[serde(with = "key_hex")]
    encryption_key: DerivedKey,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn encryption_key(&self) -> &DerivedKey {
        &self.encryption_key
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left; zero once expired
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).max(Duration::zero())
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("session_id", &self.session_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

mod key_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::crypto::DerivedKey;

    pub fn serialize<S: Serializer>(key: &DerivedKey, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(key.expose()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DerivedKey, D::Error> {
        let encoded = String::deserialize(d)?;
        let bytes = hex::decode(encoded).map_err(D::Error::custom)?;
        DerivedKey::from_slice(&bytes).map_err(D::Error::custom)
    }
}

/// Backing store for issued tokens, keyed by session id
pub trait SessionStore: Send + Sync {
    fn put(&self, token: SessionToken);
    fn get(&self, session_id: &str) -> Option<SessionToken>;
    fn remove(&self, session_id: &str) -> Option<SessionToken>;
}

/// In-process store for tests and single-instance deployments
#[derive(Default)]
pub struct MemorySessionStore {
    tokens: RwLock<HashMap<String, SessionToken>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }

    /// Drop every token expired at `now`; returns how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));
        before - tokens.len()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, token: SessionToken) {
        self.tokens.write().insert(token.session_id.clone(), token);
    }

    fn get(&self, session_id: &str) -> Option<SessionToken> {
        self.tokens.read().get(session_id).cloned()
    }

    fn remove(&self, session_id: &str) -> Option<SessionToken> {
        self.tokens.write().remove(session_id)
    }
}

/// Mints session tokens and encrypts payloads under their keys
#[derive(Debug, Clone)]
pub struct SessionKeyIssuer {
    cipher: AeadCipher,
    lifetime: Duration,
}

impl SessionKeyIssuer {
    pub fn new(cipher: AeadCipher) -> Self {
        Self {
            cipher,
            lifetime: Duration::seconds(DEFAULT_SESSION_LIFETIME_SECS),
        }
    }

    pub fn with_lifetime(cipher: AeadCipher, lifetime: Duration) -> Self {
        Self { cipher, lifetime }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self) -> Result<SessionToken> {
        self.issue_with_lifetime(self.lifetime)
    }

    pub fn issue_with_lifetime(&self, lifetime: Duration) -> Result<SessionToken> {
        let session_id = hex::encode(random_bytes::<SESSION_ID_LEN>()?);
        let encryption_key = DerivedKey::generate()?;

        let expires_at = Utc::now()
            .checked_add_signed(lifetime)
            .ok_or_else(|| CryptoError::Configuration("session lifetime out of range".into()))?;

        tracing::debug!(lifetime_secs = lifetime.num_seconds(), "session issued");

        Ok(SessionToken {
            session_id,
            encryption_key,
            expires_at,
        })
    }

    /// Issue and record in `store`
    pub fn issue_into(&self, store: &dyn SessionStore) -> Result<SessionToken> {
        let token = self.issue()?;
        store.put(token.clone());
        Ok(token)
    }

    /// Fetch a token, treating an expired entry as absent
    pub fn lookup_live(&self, store: &dyn SessionStore, session_id: &str) -> Option<SessionToken> {
        store.get(session_id).filter(|t| !t.is_expired())
    }

    pub fn encrypt_payload(&self, token: &SessionToken, data: &[u8]) -> Result<String> {
        self.cipher.encrypt_with_key(&token.encryption_key, data)
    }

    /// Decrypt regardless of expiry. Callers check `expires_at` themselves;
    /// see [`SessionKeyIssuer::decrypt_live_payload`] for the strict form.
    pub fn decrypt_payload(&self, token: &SessionToken, envelope: &str) -> Result<Vec<u8>> {
        self.cipher.decrypt_with_key(&token.encryption_key, envelope)
    }

    pub fn decrypt_live_payload(&self, token: &SessionToken, envelope: &str) -> Result<Vec<u8>> {
        if token.is_expired() {
            tracing::debug!(expires_at = %token.expires_at, "rejecting expired session");
            return Err(CryptoError::SessionExpired(token.expires_at));
        }
        self.decrypt_payload(token, envelope)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::crypto::{KeyDerivation, MasterSecret};

    fn issuer() -> SessionKeyIssuer {
        let master = Arc::new(MasterSecret::new(vec![0x5Au8; 40]).unwrap());
        SessionKeyIssuer::new(AeadCipher::new(
            KeyDerivation::with_iterations(master, 10).unwrap(),
        ))
    }

    #[test]
    fn test_issue_defaults() {
        let token = issuer().issue().unwrap();

        assert_eq!(token.session_id.len(), SESSION_ID_LEN * 2);
        assert!(token.session_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!token.is_expired());

        let remaining = token.remaining();
        assert!(remaining > Duration::hours(23));
        assert!(remaining <= Duration::hours(24));
    }

    #[test]
    fn test_tokens_unique() {
        let i = issuer();
        let a = i.issue().unwrap();
        let b = i.issue().unwrap();

        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.encryption_key(), b.encryption_key());
    }

    #[test]
    fn test_payload_roundtrip() {
        let i = issuer();
        let token = i.issue().unwrap();

        let env = i.encrypt_payload(&token, b"typing indicator").unwrap();
        assert_eq!(i.decrypt_payload(&token, &env).unwrap(), b"typing indicator");
    }

    #[test]
    fn test_other_session_cannot_decrypt() {
        let i = issuer();
        let t1 = i.issue().unwrap();
        let t2 = i.issue().unwrap();

        let env = i.encrypt_payload(&t1, b"private").unwrap();
        assert!(matches!(
            i.decrypt_payload(&t2, &env),
            Err(CryptoError::TamperDetected)
        ));
    }

    #[test]
    fn test_expired_token_advisory_and_strict() {
        let i = issuer();
        let token = i.issue_with_lifetime(Duration::seconds(-1)).unwrap();
        assert!(token.is_expired());
        assert_eq!(token.remaining(), Duration::zero());

        let env = i.encrypt_payload(&token, b"late").unwrap();
        assert_eq!(i.decrypt_payload(&token, &env).unwrap(), b"late");
        assert!(matches!(
            i.decrypt_live_payload(&token, &env),
            Err(CryptoError::SessionExpired(_))
        ));
    }

    #[test]
    fn test_live_payload_ok() {
        let i = issuer();
        let token = i.issue().unwrap();
        let env = i.encrypt_payload(&token, b"fresh").unwrap();
        assert_eq!(i.decrypt_live_payload(&token, &env).unwrap(), b"fresh");
    }

    #[test]
    fn test_token_serde_roundtrip() {
        let i = issuer();
        let token = i.issue().unwrap();
        let env = i.encrypt_payload(&token, b"persisted").unwrap();

        let json = serde_json::to_string(&token).unwrap();
        let restored: SessionToken = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.session_id, token.session_id);
        assert_eq!(restored.expires_at, token.expires_at);
        assert_eq!(i.decrypt_payload(&restored, &env).unwrap(), b"persisted");
    }

    #[test]
    fn test_debug_hides_key() {
        let token = issuer().issue().unwrap();
        let dbg = format!("{:?}", token);
        assert!(!dbg.contains(&hex::encode(token.encryption_key().expose())));
    }

    #[test]
    fn test_store_lookup() {
        let i = issuer();
        let store = MemorySessionStore::new();

        let token = i.issue_into(&store).unwrap();
        assert_eq!(store.len(), 1);
        assert!(i.lookup_live(&store, &token.session_id).is_some());
        assert!(i.lookup_live(&store, "unknown").is_none());

        assert!(store.remove(&token.session_id).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_expired_hidden_and_purged() {
        let i = issuer();
        let store = MemorySessionStore::new();

        let dead = i.issue_with_lifetime(Duration::seconds(-5)).unwrap();
        store.put(dead.clone());
        let live = i.issue_into(&store).unwrap();

        assert!(i.lookup_live(&store, &dead.session_id).is_none());
        assert!(store.get(&dead.session_id).is_some());

        assert_eq!(store.purge_expired(Utc::now()), 1);
        assert!(store.get(&dead.session_id).is_none());
        assert!(store.get(&live.session_id).is_some());
    }
}
