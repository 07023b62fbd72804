//! P-384 Diffie-Hellman key agreement.
//!
//! ## Security Notes
//!
//! - Private scalars are zeroized on drop and only leave memory sealed
//!   inside an envelope
//! - Peer public keys are validated as curve points before use
//! - Shared secrets are never used raw as AEAD keys; they go through
//!   HKDF-SHA384 first

use hkdf::Hkdf;
use p384::{ecdh::diffie_hellman, elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha384;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::aead::{open_with_key, seal_with_key, AeadCipher};
use super::envelope::EncryptedEnvelope;
use super::secret::{ct_eq, DerivedKey, KEY_LEN};
use crate::error::{CryptoError, Result};

/// SEC1 uncompressed point length
pub const PUBLIC_KEY_LEN: usize = 97;

/// Private scalar length
pub const PRIVATE_KEY_LEN: usize = 48;

/// Raw shared secret (x-coordinate) length
pub const SHARED_SECRET_LEN: usize = 48;

/// HKDF info for turning a shared secret into an AEAD key
const AEAD_KEY_INFO: &[u8] = b"msgvault:ecdh:aead:v1";

/// Validated P-384 public key. Safe to transmit; travels as hex.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EcdhPublicKey {
    inner: PublicKey,
}

impl EcdhPublicKey {
    /// Parse SEC1 bytes (compressed or uncompressed). Off-curve points and
    /// the identity are rejected.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        PublicKey::from_sec1_bytes(bytes)
            .map(|inner| Self { inner })
            .map_err(|_| {
                CryptoError::InvalidPublicKey(format!(
                    "not a P-384 point ({} bytes)",
                    bytes.len()
                ))
            })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|_| CryptoError::InvalidPublicKey("not hex".into()))?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Uncompressed SEC1 encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.to_encoded_point(false).as_bytes().to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl TryFrom<String> for EcdhPublicKey {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<EcdhPublicKey> for String {
    fn from(key: EcdhPublicKey) -> Self {
        key.to_hex()
    }
}

impl std::fmt::Debug for EcdhPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = self.to_hex();
        write!(f, "EcdhPublicKey({}..)", &hex[..16])
    }
}

/// Key pair owned by the party that generated it.
///
/// Clone is intentionally not implemented.
pub struct KeyPair {
    secret: SecretKey,
    public: EcdhPublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = EcdhPublicKey {
            inner: secret.public_key(),
        };
        Self { secret, public }
    }

    pub fn public_key(&self) -> &EcdhPublicKey {
        &self.public
    }

    pub fn diffie_hellman(&self, peer: &EcdhPublicKey) -> SharedSecret {
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.inner.as_affine());
        let mut bytes = [0u8; SHARED_SECRET_LEN];
        bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
        SharedSecret { bytes }
    }

    /// Encrypt the private scalar under the master-derived AEAD path
    pub fn seal_private_key(&self, cipher: &AeadCipher) -> Result<String> {
        let mut scalar = self.secret.to_bytes();
        let sealed = cipher.encrypt(scalar.as_slice());
        scalar.as_mut_slice().zeroize();
        sealed
    }

    /// Restore a key pair from [`KeyPair::seal_private_key`] output
    pub fn open_sealed_private_key(cipher: &AeadCipher, sealed: &str) -> Result<Self> {
        let mut scalar = cipher.decrypt(sealed)?;
        let secret = if scalar.len() == PRIVATE_KEY_LEN {
            SecretKey::from_slice(&scalar).ok()
        } else {
            None
        };
        scalar.zeroize();

        let secret = secret.ok_or_else(|| {
            CryptoError::MalformedEnvelope("sealed payload is not a P-384 private key".into())
        })?;
        let public = EcdhPublicKey {
            inner: secret.public_key(),
        };
        Ok(Self { secret, public })
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public: {:?} }}", self.public)
    }
}

/// Output of Diffie-Hellman. Same handling rules as a derived key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_LEN],
}

impl SharedSecret {
    /// 32-byte AEAD key via HKDF-SHA384
    pub fn aead_key(&self) -> Result<DerivedKey> {
        let hk = Hkdf::<Sha384>::new(None, &self.bytes);
        let mut okm = [0u8; KEY_LEN];
        hk.expand(AEAD_KEY_INFO, &mut okm)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let key = DerivedKey::from_bytes(okm);
        okm.zeroize();
        Ok(key)
    }

    /// Raw x-coordinate, for interop only
    pub fn expose(&self) -> &[u8; SHARED_SECRET_LEN] {
        &self.bytes
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        ct_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for SharedSecret {}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret([REDACTED])")
    }
}

/// Message sealed to a recipient's public key with an ephemeral key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMessage {
    pub ephemeral_public_key: EcdhPublicKey,
    pub envelope: String,
}

/// Key agreement operations. Performs no I/O; transporting public keys is
/// the caller's concern.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdhExchange;

impl EcdhExchange {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_key_pair(&self) -> KeyPair {
        KeyPair::generate()
    }

    /// Validate the peer's hex-encoded key and compute the shared secret
    pub fn compute_shared_secret(&self, own: &KeyPair, peer_public_hex: &str) -> Result<SharedSecret> {
        let peer = EcdhPublicKey::from_hex(peer_public_hex)?;
        Ok(own.diffie_hellman(&peer))
    }

    /// Forward-secret path: fresh ephemeral key per message
    pub fn seal_for(&self, recipient: &EcdhPublicKey, plaintext: &[u8]) -> Result<SealedMessage> {
        let ephemeral = KeyPair::generate();
        let key = ephemeral.diffie_hellman(recipient).aead_key()?;
        let envelope = seal_with_key(&key, plaintext)?.encode();

        Ok(SealedMessage {
            ephemeral_public_key: ephemeral.public.clone(),
            envelope,
        })
    }

    pub fn open_sealed(&self, recipient: &KeyPair, message: &SealedMessage) -> Result<Vec<u8>> {
        let envelope = EncryptedEnvelope::parse(&message.envelope)?;
        let key = recipient
            .diffie_hellman(&message.ephemeral_public_key)
            .aead_key()?;
        open_with_key(&key, &envelope)
    }
}
