//! Property-based tests for the envelope engine.
//!
//! - Arbitrary byte strings survive encrypt/decrypt
//! - Any single flipped bit in tag or ciphertext is detected
//! - Arbitrary strings never panic the envelope parser
//! - Password and HMAC verification separate distinct inputs

use std::sync::Arc;

use proptest::prelude::*;

use crate::crypto::{AeadCipher, EncryptedEnvelope, HmacAuthenticator, KeyDerivation, MasterSecret, TAG_LEN};
use crate::error::CryptoError;
use crate::password::PasswordHasher;

fn cipher() -> AeadCipher {
    let master = Arc::new(MasterSecret::new(vec![0x33u8; 32]).unwrap());
    AeadCipher::new(KeyDerivation::with_iterations(master, 1).unwrap())
}

fn authenticator() -> HmacAuthenticator {
    HmacAuthenticator::new(&MasterSecret::new(vec![0x44u8; 32]).unwrap()).unwrap()
}

// ==================== Envelope Property Tests ====================

proptest! {
    /// decrypt(encrypt(p)) == p for any byte string, including empty.
    #[test]
    fn envelope_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..2048)) {
        let c = cipher();
        let env = c.encrypt(&plaintext).unwrap();
        prop_assert_eq!(c.decrypt(&env).unwrap(), plaintext);
    }

    /// Flipping one bit of tag||ciphertext always raises TamperDetected.
    #[test]
    fn single_bit_flip_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let c = cipher();
        let mut sealed = c.seal(&plaintext).unwrap();

        let idx = position.index(TAG_LEN + sealed.ciphertext.len());
        if idx < TAG_LEN {
            sealed.tag[idx] ^= 1 << bit;
        } else {
            sealed.ciphertext[idx - TAG_LEN] ^= 1 << bit;
        }

        let result = c.decrypt(&sealed.encode());
        prop_assert!(matches!(result, Err(CryptoError::TamperDetected)));
    }

    /// The parser rejects garbage with an error, never a panic.
    #[test]
    fn parser_never_panics(input in ".{0,256}") {
        let _ = EncryptedEnvelope::parse(&input);
    }
}

// ==================== Authentication Property Tests ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn password_distinguishes(a in ".{0,32}", b in ".{0,32}") {
        let hasher = PasswordHasher::new(10).unwrap();
        let record = hasher.hash(&a).unwrap();

        prop_assert!(hasher.verify(&a, &record));
        prop_assert_eq!(hasher.verify(&b, &record), a == b);
    }

    #[test]
    fn hmac_distinguishes(
        a in prop::collection::vec(any::<u8>(), 0..128),
        b in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let auth = authenticator();
        let tag = auth.sign(&a);

        prop_assert!(auth.verify(&a, &tag));
        prop_assert_eq!(auth.verify(&b, &tag), a == b);
    }
}
