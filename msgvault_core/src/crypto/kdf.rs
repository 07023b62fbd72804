//! PBKDF2-HMAC-SHA512 derivation of per-envelope keys from the master secret

use std::sync::Arc;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroize;

use super::secret::{DerivedKey, MasterSecret, KEY_LEN};
use crate::error::{CryptoError, Result};

/// Default PBKDF2 iteration count for envelope keys
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Salt length embedded in every envelope
pub const SALT_LEN: usize = 32;

/// Derives deterministic keys from (master secret, salt).
///
/// Identical inputs always yield the identical key, so envelopes can be
/// decrypted without storing keys.
#[derive(Clone)]
pub struct KeyDerivation {
    master: Arc<MasterSecret>,
    iterations: u32,
}

impl KeyDerivation {
    pub fn new(master: Arc<MasterSecret>) -> Self {
        Self {
            master,
            iterations: DEFAULT_KDF_ITERATIONS,
        }
    }

    pub fn with_iterations(master: Arc<MasterSecret>, iterations: u32) -> Result<Self> {
        if iterations == 0 {
            return Err(CryptoError::Configuration(
                "KDF iterations must be >= 1".into(),
            ));
        }
        Ok(Self { master, iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive the 32-byte key for `salt`
    pub fn derive(&self, salt: &[u8]) -> DerivedKey {
        let mut okm = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha512>(self.master.expose(), salt, self.iterations, &mut okm);
        let key = DerivedKey::from_bytes(okm);
        okm.zeroize();
        key
    }
}

impl std::fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDerivation")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}
