//! Error types for MSGVAULT core

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Master secret missing or too short. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Malformed password record: {0}")]
    MalformedRecord(String),

    /// Authentication tag mismatch. Deliberately carries no detail.
    #[error("Decryption failed - data tampered or wrong key")]
    TamperDetected,

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Session expired at {0}")]
    SessionExpired(DateTime<Utc>),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Random generator unavailable: {0}")]
    Rng(String),

    #[error("Blocking task failed: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

impl CryptoError {
    /// Short, stable name of the error kind. Safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::MalformedRecord(_) => "malformed_record",
            Self::TamperDetected => "tamper_detected",
            Self::InvalidPublicKey(_) => "invalid_public_key",
            Self::SessionExpired(_) => "session_expired",
            Self::KeyDerivation(_) => "key_derivation",
            Self::Encryption(_) => "encryption",
            Self::Rng(_) => "rng",
            Self::Runtime(_) => "runtime",
        }
    }

    pub fn is_security_critical(&self) -> bool {
        matches!(self, Self::TamperDetected | Self::InvalidPublicKey(_))
    }

    /// Cryptographic failures are deterministic; the same input fails again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }
}
