//! AEAD encryption - AES-256-GCM over the envelope format

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use zeroize::Zeroize;

use super::envelope::{EncryptedEnvelope, NONCE_LEN, TAG_LEN};
use super::kdf::{KeyDerivation, SALT_LEN};
use super::secret::{random_bytes, DerivedKey};
use crate::error::{CryptoError, Result};

/// Associated data bound into every envelope. Part of the persisted format:
/// changing it makes every stored envelope undecryptable.
pub const ASSOCIATED_DATA: &[u8] = b"msgvault:envelope:v1";

/// Authenticated encryption of arbitrary byte strings.
///
/// The default path derives a fresh key per call from the master secret and
/// a random salt. The `*_with_key` path takes a caller-supplied key (session
/// keys, ECDH output) and leaves the embedded salt unused.
#[derive(Clone, Debug)]
pub struct AeadCipher {
    kdf: KeyDerivation,
}

impl AeadCipher {
    pub fn new(kdf: KeyDerivation) -> Self {
        Self { kdf }
    }

    pub fn kdf(&self) -> &KeyDerivation {
        &self.kdf
    }

    /// Encrypt under a key derived from the master secret
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        Ok(self.seal(plaintext)?.encode())
    }

    /// Decrypt an envelope string produced by [`AeadCipher::encrypt`]
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>> {
        let envelope = EncryptedEnvelope::parse(encoded)?;
        self.open(&envelope)
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
        let salt = random_bytes::<SALT_LEN>()?;
        let key = self.kdf.derive(&salt);
        seal_with_salt(&key, salt, plaintext)
    }

    pub fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
        let key = self.kdf.derive(&envelope.salt);
        open_with_key(&key, envelope)
    }

    /// Encrypt under an externally supplied key
    pub fn encrypt_with_key(&self, key: &DerivedKey, plaintext: &[u8]) -> Result<String> {
        Ok(seal_with_key(key, plaintext)?.encode())
    }

    pub fn decrypt_with_key(&self, key: &DerivedKey, encoded: &str) -> Result<Vec<u8>> {
        let envelope = EncryptedEnvelope::parse(encoded)?;
        open_with_key(key, &envelope)
    }
}

/// Seal with an explicit key. A random salt still fills the slot so the
/// layout matches master-derived envelopes.
pub fn seal_with_key(key: &DerivedKey, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
    seal_with_salt(key, random_bytes::<SALT_LEN>()?, plaintext)
}

fn seal_with_salt(
    key: &DerivedKey,
    salt: [u8; SALT_LEN],
    plaintext: &[u8],
) -> Result<EncryptedEnvelope> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let nonce = random_bytes::<NONCE_LEN>()?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), ASSOCIATED_DATA, &mut buffer)
        .map_err(|e| {
            buffer.zeroize();
            CryptoError::Encryption(e.to_string())
        })?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    tracing::debug!(plaintext_len = plaintext.len(), "envelope sealed");

    Ok(EncryptedEnvelope {
        salt,
        nonce,
        tag: tag_bytes,
        ciphertext: buffer,
    })
}

/// Verify and decrypt. A failed tag check never returns any plaintext.
pub fn open_with_key(key: &DerivedKey, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key.expose()).map_err(|_| CryptoError::TamperDetected)?;

    let mut buffer = envelope.ciphertext.clone();
    let result = cipher.decrypt_in_place_detached(
        Nonce::from_slice(&envelope.nonce),
        ASSOCIATED_DATA,
        &mut buffer,
        Tag::from_slice(&envelope.tag),
    );

    match result {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            tracing::warn!(
                kind = CryptoError::TamperDetected.kind(),
                ciphertext_len = envelope.ciphertext.len(),
                "envelope authentication failed"
            );
            Err(CryptoError::TamperDetected)
        }
    }
}
