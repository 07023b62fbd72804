//! Salted PBKDF2 password hashing
//!
//! Records are `hex(salt):hex(hash)`. They are created on password set,
//! compared on login and replaced wholesale on change; never decrypted.

use std::fmt;
use std::str::FromStr;

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use zeroize::Zeroize;

use crate::crypto::{ct_eq, random_bytes};
use crate::error::{CryptoError, Result};

/// Default iteration count for stored passwords
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 210_000;

pub const PASSWORD_SALT_LEN: usize = 32;
pub const PASSWORD_HASH_LEN: usize = 64;

/// Stored password verifier
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PasswordRecord {
    salt: [u8; PASSWORD_SALT_LEN],
    hash: [u8; PASSWORD_HASH_LEN],
}

impl PasswordRecord {
    pub fn salt(&self) -> &[u8; PASSWORD_SALT_LEN] {
        &self.salt
    }

    pub fn hash(&self) -> &[u8; PASSWORD_HASH_LEN] {
        &self.hash
    }
}

impl fmt::Display for PasswordRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.salt), hex::encode(self.hash))
    }
}

impl fmt::Debug for PasswordRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordRecord {{ salt: {}, .. }}", hex::encode(self.salt))
    }
}

impl FromStr for PasswordRecord {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        let (salt_hex, hash_hex) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| CryptoError::MalformedRecord("missing separator".into()))?;

        let salt = decode_fixed::<PASSWORD_SALT_LEN>(salt_hex, "salt")?;
        let hash = decode_fixed::<PASSWORD_HASH_LEN>(hash_hex, "hash")?;
        Ok(Self { salt, hash })
    }
}

impl TryFrom<String> for PasswordRecord {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PasswordRecord> for String {
    fn from(record: PasswordRecord) -> Self {
        record.to_string()
    }
}

fn decode_fixed<const N: usize>(part: &str, name: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(part)
        .map_err(|_| CryptoError::MalformedRecord(format!("{} is not hex", name)))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        CryptoError::MalformedRecord(format!("{} must be {} bytes, got {}", name, N, len))
    })
}

/// Hashes and verifies passwords. Complexity policy is the caller's; empty
/// passwords are hashed like any other.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_PASSWORD_ITERATIONS,
        }
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Result<Self> {
        if iterations == 0 {
            return Err(CryptoError::Configuration(
                "password iterations must be >= 1".into(),
            ));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn hash(&self, password: &str) -> Result<PasswordRecord> {
        let salt = random_bytes::<PASSWORD_SALT_LEN>()?;
        let hash = self.compute(password, &salt);
        Ok(PasswordRecord { salt, hash })
    }

    /// Recompute with the stored salt and compare in constant time.
    /// A record produced under a different iteration count never matches.
    pub fn verify(&self, password: &str, record: &PasswordRecord) -> bool {
        let mut candidate = self.compute(password, &record.salt);
        let matched = ct_eq(&candidate, &record.hash);
        candidate.zeroize();
        matched
    }

    /// Verify against the stored string form. Malformed records are a
    /// mismatch, never an error.
    pub fn verify_encoded(&self, password: &str, stored: &str) -> bool {
        match stored.parse::<PasswordRecord>() {
            Ok(record) => self.verify(password, &record),
            Err(e) => {
                tracing::warn!(kind = e.kind(), "stored password record rejected");
                false
            }
        }
    }

    fn compute(&self, password: &str, salt: &[u8]) -> [u8; PASSWORD_HASH_LEN] {
        let mut out = [0u8; PASSWORD_HASH_LEN];
        pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, self.iterations, &mut out);
        out
    }
}
