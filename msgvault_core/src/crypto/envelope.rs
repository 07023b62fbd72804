//! Envelope wire format
//!
//! ```text
//! base64( b64(salt) ":" b64(nonce) ":" b64(tag) ":" b64(ciphertext) )
//! ```
//!
//! The double encoding is part of the persisted format. Envelopes stored by
//! earlier deployments must keep decrypting, so it is not simplified here.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::kdf::SALT_LEN;
use crate::error::{CryptoError, Result};

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;

const SEPARATOR: char = ':';
const COMPONENTS: usize = 4;

/// Parsed envelope. Callers normally only see the encoded string.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Render the transport/storage string
    pub fn encode(&self) -> String {
        let inner = format!(
            "{}{sep}{}{sep}{}{sep}{}",
            STANDARD.encode(self.salt),
            STANDARD.encode(self.nonce),
            STANDARD.encode(self.tag),
            STANDARD.encode(&self.ciphertext),
            sep = SEPARATOR,
        );
        STANDARD.encode(inner)
    }

    /// Parse and length-check an envelope string. No key is touched here.
    pub fn parse(encoded: &str) -> Result<Self> {
        let outer = STANDARD
            .decode(encoded.trim())
            .map_err(|_| malformed("outer layer is not base64"))?;
        let inner =
            String::from_utf8(outer).map_err(|_| malformed("inner layer is not text"))?;

        let parts: Vec<&str> = inner.split(SEPARATOR).collect();
        if parts.len() != COMPONENTS {
            return Err(malformed(format!(
                "expected {} components, got {}",
                COMPONENTS,
                parts.len()
            )));
        }

        let salt = decode_fixed::<SALT_LEN>(parts[0], "salt")?;
        let nonce = decode_fixed::<NONCE_LEN>(parts[1], "nonce")?;
        let tag = decode_fixed::<TAG_LEN>(parts[2], "tag")?;
        let ciphertext = STANDARD
            .decode(parts[3])
            .map_err(|_| malformed("ciphertext is not base64"))?;

        Ok(Self {
            salt,
            nonce,
            tag,
            ciphertext,
        })
    }
}

impl std::fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedEnvelope")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

fn decode_fixed<const N: usize>(part: &str, name: &str) -> Result<[u8; N]> {
    let bytes = STANDARD
        .decode(part)
        .map_err(|_| malformed(format!("{} is not base64", name)))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        malformed(format!("{} must be {} bytes, got {}", name, N, len))
    })
}

fn malformed(reason: impl Into<String>) -> CryptoError {
    CryptoError::MalformedEnvelope(reason.into())
}
