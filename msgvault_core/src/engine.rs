//! Engine facade
//!
//! Composes every component over one immutable master secret. Rotation swaps
//! the whole component set behind an `Arc`; operations already running keep
//! the snapshot they started with.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::RwLock;

use crate::commitment::{CommitmentProof, Proof};
use crate::config::{self, CoreConfig};
use crate::crypto::{
    AeadCipher, EcdhExchange, EcdhPublicKey, HmacAuthenticator, KeyDerivation, KeyPair,
    MasterSecret, SealedMessage, SharedSecret,
};
use crate::error::{CryptoError, Result};
use crate::password::{PasswordHasher, PasswordRecord};
use crate::session::{SessionKeyIssuer, SessionToken};

/// Components bound to one master secret
#[derive(Debug)]
pub struct Components {
    pub cipher: AeadCipher,
    pub mac: HmacAuthenticator,
    pub sessions: SessionKeyIssuer,
}

impl Components {
    fn build(master: MasterSecret, config: &CoreConfig) -> Result<Self> {
        let master = Arc::new(master);
        let kdf = KeyDerivation::with_iterations(master.clone(), config.kdf_iterations)?;
        let cipher = AeadCipher::new(kdf);
        let mac = HmacAuthenticator::new(&master)?;
        let sessions = SessionKeyIssuer::with_lifetime(
            cipher.clone(),
            Duration::seconds(config.session_lifetime_secs),
        );

        Ok(Self {
            cipher,
            mac,
            sessions,
        })
    }
}

pub struct CryptoEngine {
    config: CoreConfig,
    current: RwLock<Arc<Components>>,
    passwords: PasswordHasher,
    ecdh: EcdhExchange,
    commitments: CommitmentProof,
}

impl CryptoEngine {
    pub fn new(master: MasterSecret, config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let components = Components::build(master, &config)?;
        let passwords = PasswordHasher::new(config.password_iterations)?;

        tracing::info!(
            kdf_iterations = config.kdf_iterations,
            password_iterations = config.password_iterations,
            "crypto engine initialised"
        );

        Ok(Self {
            config,
            current: RwLock::new(Arc::new(components)),
            passwords,
            ecdh: EcdhExchange::new(),
            commitments: CommitmentProof::new(),
        })
    }

    /// Fail-fast startup from the process environment
    pub fn from_env() -> Result<Self> {
        let config = CoreConfig::from_env()?;
        let master = config::master_secret_from_env()?;
        Self::new(master, config)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Components for the current master secret
    pub fn snapshot(&self) -> Arc<Components> {
        self.current.read().clone()
    }

    /// Swap in a new master secret; returns the previous components so
    /// stored envelopes can be resealed with [`CryptoEngine::reseal`]
    pub fn rotate_master_secret(&self, master: MasterSecret) -> Result<Arc<Components>> {
        let next = Arc::new(Components::build(master, &self.config)?);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        tracing::info!("master secret rotated");
        Ok(previous)
    }

    /// Decrypt under `previous` and re-encrypt under the current secret
    pub fn reseal(&self, envelope: &str, previous: &Components) -> Result<String> {
        let plaintext = previous.cipher.decrypt(envelope)?;
        self.encrypt(&plaintext)
    }

    // Envelopes

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        self.snapshot().cipher.encrypt(plaintext)
    }

    pub fn decrypt(&self, envelope: &str) -> Result<Vec<u8>> {
        self.snapshot().cipher.decrypt(envelope)
    }

    // Message authentication

    pub fn sign(&self, message: &[u8]) -> String {
        self.snapshot().mac.sign(message)
    }

    pub fn verify_tag(&self, message: &[u8], tag: &str) -> bool {
        self.snapshot().mac.verify(message, tag)
    }

    // Passwords

    pub fn passwords(&self) -> &PasswordHasher {
        &self.passwords
    }

    pub fn hash_password(&self, password: &str) -> Result<PasswordRecord> {
        self.passwords.hash(password)
    }

    pub fn verify_password(&self, password: &str, stored: &str) -> bool {
        self.passwords.verify_encoded(password, stored)
    }

    // Sessions

    pub fn issue_session(&self) -> Result<SessionToken> {
        self.snapshot().sessions.issue()
    }

    pub fn encrypt_session_payload(&self, token: &SessionToken, data: &[u8]) -> Result<String> {
        self.snapshot().sessions.encrypt_payload(token, data)
    }

    pub fn decrypt_session_payload(&self, token: &SessionToken, envelope: &str) -> Result<Vec<u8>> {
        self.snapshot().sessions.decrypt_payload(token, envelope)
    }

    // Key agreement

    pub fn ecdh(&self) -> &EcdhExchange {
        &self.ecdh
    }

    pub fn generate_key_pair(&self) -> KeyPair {
        self.ecdh.generate_key_pair()
    }

    pub fn compute_shared_secret(&self, own: &KeyPair, peer_public_hex: &str) -> Result<SharedSecret> {
        self.ecdh.compute_shared_secret(own, peer_public_hex)
    }

    pub fn seal_for(&self, recipient: &EcdhPublicKey, plaintext: &[u8]) -> Result<SealedMessage> {
        self.ecdh.seal_for(recipient, plaintext)
    }

    pub fn open_sealed(&self, recipient: &KeyPair, message: &SealedMessage) -> Result<Vec<u8>> {
        self.ecdh.open_sealed(recipient, message)
    }

    // Commitments

    pub fn commit(&self, secret: &[u8]) -> Result<Proof> {
        self.commitments.commit(secret)
    }

    pub fn verify_commitment(&self, proof: &Proof, secret: &[u8]) -> bool {
        self.commitments.verify(proof, secret)
    }

    // Blocking pool. PBKDF2 dominates these calls, so async callers must not
    // run them on a request task.

    pub async fn encrypt_blocking(&self, plaintext: Vec<u8>) -> Result<String> {
        let components = self.snapshot();
        run_blocking(move || components.cipher.encrypt(&plaintext)).await
    }

    pub async fn decrypt_blocking(&self, envelope: String) -> Result<Vec<u8>> {
        let components = self.snapshot();
        run_blocking(move || components.cipher.decrypt(&envelope)).await
    }

    pub async fn hash_password_blocking(&self, password: String) -> Result<PasswordRecord> {
        let hasher = self.passwords.clone();
        run_blocking(move || hasher.hash(&password)).await
    }

    pub async fn verify_password_blocking(&self, password: String, stored: String) -> Result<bool> {
        let hasher = self.passwords.clone();
        run_blocking(move || Ok(hasher.verify_encoded(&password, &stored))).await
    }
}

impl std::fmt::Debug for CryptoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CryptoError::Runtime(e.to_string()))?
}
