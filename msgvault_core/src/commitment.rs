//! Commitment-based proof of knowledge.
//!
//! `commitment = SHA-256(secret)`, `challenge` is random and
//! `response = HMAC-SHA256(key = secret, challenge)`.
//!
//! This is NOT a zero-knowledge proof: checking the response requires the
//! verifier to hold the secret. It proves possession between two parties that
//! already share the secret, nothing more. A Schnorr-style identification
//! protocol is the replacement when real zero-knowledge is required.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::{ct_eq, random_bytes};
use crate::error::{CryptoError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const CHALLENGE_LEN: usize = 32;

/// Hex-encoded proof triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub commitment: String,
    pub challenge: String,
    pub response: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommitmentProof;

impl CommitmentProof {
    pub fn new() -> Self {
        Self
    }

    pub fn commit(&self, secret: &[u8]) -> Result<Proof> {
        let challenge = random_bytes::<CHALLENGE_LEN>()?;
        let response = respond(secret, &challenge)?;

        Ok(Proof {
            commitment: hex::encode(commitment_of(secret)),
            challenge: hex::encode(challenge),
            response: hex::encode(response),
        })
    }

    /// Recompute commitment and response; both must match
    pub fn verify(&self, proof: &Proof, secret: &[u8]) -> bool {
        let (Ok(commitment), Ok(challenge), Ok(response)) = (
            hex::decode(&proof.commitment),
            hex::decode(&proof.challenge),
            hex::decode(&proof.response),
        ) else {
            return false;
        };

        let Ok(expected_response) = respond(secret, &challenge) else {
            return false;
        };

        // Evaluate both comparisons so timing does not reveal which failed
        let commitment_ok = ct_eq(&commitment, &commitment_of(secret));
        let response_ok = ct_eq(&response, &expected_response);
        commitment_ok & response_ok
    }
}

fn commitment_of(secret: &[u8]) -> [u8; 32] {
    Sha256::digest(secret).into()
}

fn respond(secret: &[u8], challenge: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    mac.update(challenge);
    Ok(mac.finalize().into_bytes().into())
}
