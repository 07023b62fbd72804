//! HMAC-SHA512 message authentication keyed by the master secret

use hmac::{Hmac, Mac};
use sha2::Sha512;

use super::secret::MasterSecret;
use crate::error::{CryptoError, Result};

type HmacSha512 = Hmac<Sha512>;

/// Tag length in bytes (hex form is twice as long)
pub const MAC_LEN: usize = 64;

/// Signs and verifies messages. Tags are lowercase hex.
#[derive(Clone)]
pub struct HmacAuthenticator {
    keyed: HmacSha512,
}

impl HmacAuthenticator {
    pub fn new(master: &MasterSecret) -> Result<Self> {
        let keyed = HmacSha512::new_from_slice(master.expose())
            .map_err(|e| CryptoError::KeyDerivation(format!("HMAC key rejected: {}", e)))?;
        Ok(Self { keyed })
    }

    pub fn sign_raw(&self, message: &[u8]) -> [u8; MAC_LEN] {
        let mut mac = self.keyed.clone();
        mac.update(message);
        let mut out = [0u8; MAC_LEN];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.sign_raw(message))
    }

    /// Constant-time check. Undecodable or wrong-length tags are a mismatch,
    /// not an error.
    pub fn verify(&self, message: &[u8], tag: &str) -> bool {
        match hex::decode(tag.trim()) {
            Ok(bytes) => self.verify_raw(message, &bytes),
            Err(_) => false,
        }
    }

    pub fn verify_raw(&self, message: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.keyed.clone();
        mac.update(message);
        mac.verify_slice(tag).is_ok()
    }
}

impl std::fmt::Debug for HmacAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HmacAuthenticator([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn auth() -> HmacAuthenticator {
        let master = MasterSecret::new("hmac-master-secret-at-least-32-bytes").unwrap();
        HmacAuthenticator::new(&master).unwrap()
    }

    #[test]
    fn test_sign_verify() {
        let a = auth();
        let tag = a.sign(b"message");

        assert_eq!(tag.len(), MAC_LEN * 2);
        assert!(a.verify(b"message", &tag));
    }

    #[test]
    fn test_other_message_fails() {
        let a = auth();
        let tag = a.sign(b"message one");
        assert!(!a.verify(b"message two", &tag));
    }

    #[test]
    fn test_deterministic() {
        let a = auth();
        assert_eq!(a.sign(b"same"), a.sign(b"same"));
    }

    #[test]
    fn test_other_key_fails() {
        let other = MasterSecret::new("another-hmac-master-secret-32-bytes!").unwrap();
        let tag = auth().sign(b"message");
        assert!(!HmacAuthenticator::new(&other).unwrap().verify(b"message", &tag));
    }

    #[test]
    fn test_malformed_tags_are_false() {
        let a = auth();
        let tag = a.sign(b"m");

        assert!(!a.verify(b"m", "not-hex"));
        assert!(!a.verify(b"m", ""));
        assert!(!a.verify(b"m", &tag[..tag.len() - 2]));
        assert!(!a.verify(b"m", &format!("{}00", tag)));
    }

    #[test]
    fn test_matches_plain_hmac_sha512() {
        let master = MasterSecret::new(vec![0x0bu8; 32]).unwrap();
        let a = HmacAuthenticator::new(&master).unwrap();

        let mut direct = HmacSha512::new_from_slice(&[0x0bu8; 32]).unwrap();
        direct.update(b"Hi There");
        let expected = hex::encode(direct.finalize().into_bytes());

        assert_eq!(a.sign(b"Hi There"), expected);
    }

    fn median_verify_time(a: &HmacAuthenticator, msg: &[u8], tag: &[u8]) -> Duration {
        let mut samples: Vec<Duration> = (0..2_001)
            .map(|_| {
                let start = Instant::now();
                std::hint::black_box(a.verify_raw(msg, tag));
                start.elapsed()
            })
            .collect();
        samples.sort();
        samples[samples.len() / 2]
    }

    #[test]
    #[ignore = "timing-sensitive; run with --release --ignored, or `cargo bench --bench mac`"]
    fn test_verify_time_independent_of_mismatch_position() {
        let a = auth();
        let msg = b"timing sample";
        let good = a.sign_raw(msg);

        let mut early = good;
        early[0] ^= 0xFF;
        let mut late = good;
        late[MAC_LEN - 1] ^= 0xFF;

        let t_early = median_verify_time(&a, msg, &early).as_nanos() as f64;
        let t_late = median_verify_time(&a, msg, &late).as_nanos() as f64;

        let ratio = t_early.max(t_late) / t_early.min(t_late).max(1.0);
        assert!(ratio < 1.5, "early={t_early}ns late={t_late}ns");
    }
}
