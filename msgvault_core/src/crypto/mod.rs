//! Cryptographic core - PBKDF2, AES-256-GCM, P-384 ECDH, HMAC-SHA512

pub mod aead;
pub mod ecdh;
pub mod envelope;
pub mod kdf;
pub mod mac;
pub mod secret;

pub use aead::{AeadCipher, ASSOCIATED_DATA};
pub use ecdh::{EcdhExchange, EcdhPublicKey, KeyPair, SealedMessage, SharedSecret};
pub use envelope::{EncryptedEnvelope, NONCE_LEN, TAG_LEN};
pub use kdf::{KeyDerivation, DEFAULT_KDF_ITERATIONS, SALT_LEN};
pub use mac::HmacAuthenticator;
pub use secret::{ct_eq, random_bytes, DerivedKey, MasterSecret, KEY_LEN, MIN_MASTER_SECRET_LEN};
