//! # MSGVAULT core - encryption and key management for message payloads
//!
//! ## Capabilities:
//! - Envelope encryption (AES-256-GCM, PBKDF2-derived per-envelope keys)
//! - P-384 key agreement with forward-secret sealing
//! - HMAC-SHA512 message authentication
//! - PBKDF2 password records
//! - Short-lived session keys
//! - Commitment-based proof of possession
//!
//! Every operation is a pure function of its inputs plus the immutable
//! master secret. Nothing here performs I/O.

pub mod commitment;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod password;
pub mod session;

#[cfg(test)]
mod proptests;

// Re-exports
pub use commitment::{CommitmentProof, Proof};
pub use config::CoreConfig;
pub use crypto::{
    AeadCipher, DerivedKey, EcdhExchange, EcdhPublicKey, EncryptedEnvelope, HmacAuthenticator,
    KeyDerivation, KeyPair, MasterSecret, SealedMessage, SharedSecret,
};
pub use engine::{Components, CryptoEngine};
pub use error::{CryptoError, Result};
pub use password::{PasswordHasher, PasswordRecord};
pub use session::{MemorySessionStore, SessionKeyIssuer, SessionStore, SessionToken};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// System name
pub const SYSTEM_NAME: &str = "MSGVAULT";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "1.0.0");
    }

    #[test]
    fn test_short_master_secret_fails_before_use() {
        let lookup = |name: &str| {
            (name == config::MASTER_SECRET_ENV).then(|| "sixteen-chars!!!".to_string())
        };
        let err = config::master_secret_from_lookup(lookup).unwrap_err();
        assert!(matches!(err, CryptoError::Configuration(_)));
    }
}
