//! Key material wrappers and secure randomness

use rand_core::{OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};

/// Symmetric key length (AES-256)
pub const KEY_LEN: usize = 32;

/// Minimum master secret length, checked once at startup
pub const MIN_MASTER_SECRET_LEN: usize = 32;

/// Process-wide long-lived secret. Immutable once constructed.
pub struct MasterSecret {
    inner: SecretBox<[u8]>,
}

impl MasterSecret {
    /// Validates length and takes ownership of the bytes. The source buffer
    /// is wiped, spare capacity included.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let mut bytes: Vec<u8> = bytes.into();
        let len = bytes.len();
        if len < MIN_MASTER_SECRET_LEN {
            bytes.zeroize();
            return Err(CryptoError::Configuration(format!(
                "master secret must be at least {} bytes, got {}",
                MIN_MASTER_SECRET_LEN, len
            )));
        }

        Ok(Self {
            inner: SecretBox::new(box_and_wipe(&mut bytes)),
        })
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.expose().len()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterSecret([REDACTED; {}])", self.len())
    }
}

/// 256-bit symmetric key. Never persisted; zeroized on drop.
pub struct DerivedKey {
    inner: SecretBox<[u8; KEY_LEN]>,
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: SecretBox::new(Box::new(bytes)),
        }
    }

    /// Accepts externally supplied key material (session keys, ECDH output).
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::KeyDerivation(format!(
                "key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(arr))
    }

    /// Fresh random key
    pub fn generate() -> Result<Self> {
        Ok(Self::from_bytes(random_bytes::<KEY_LEN>()?))
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }
}

impl Clone for DerivedKey {
    fn clone(&self) -> Self {
        Self::from_bytes(*self.expose())
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        ct_eq(self.expose(), other.expose())
    }
}

impl Eq for DerivedKey {}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Copy into an exactly sized box, then zeroize the whole source allocation.
/// `Vec::into_boxed_slice` would free excess capacity without wiping it.
fn box_and_wipe(bytes: &mut Vec<u8>) -> Box<[u8]> {
    let boxed: Box<[u8]> = bytes.as_slice().into();
    bytes.zeroize();
    boxed
}

/// Fill an array from the OS generator
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(buf)
}

/// Constant-time equality. Length mismatch returns false without leaking
/// where the contents differ.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
