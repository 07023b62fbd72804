//! Startup configuration
//!
//! Everything is read once when the process starts. A missing or short
//! master secret is fatal here, never later at first use.

use serde::{Deserialize, Serialize};

use crate::crypto::{MasterSecret, DEFAULT_KDF_ITERATIONS};
use crate::error::{CryptoError, Result};
use crate::password::DEFAULT_PASSWORD_ITERATIONS;
use crate::session::DEFAULT_SESSION_LIFETIME_SECS;

/// Required: the master secret (at least 32 bytes)
pub const MASTER_SECRET_ENV: &str = "MSGVAULT_MASTER_SECRET";
pub const KDF_ITERATIONS_ENV: &str = "MSGVAULT_KDF_ITERATIONS";
pub const PASSWORD_ITERATIONS_ENV: &str = "MSGVAULT_PASSWORD_ITERATIONS";
pub const SESSION_LIFETIME_ENV: &str = "MSGVAULT_SESSION_LIFETIME_SECS";

/// Tunables. The master secret is loaded separately and never lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// PBKDF2 rounds for envelope keys. Part of the persisted format:
    /// envelopes only open under the count they were sealed with.
    pub kdf_iterations: u32,
    /// PBKDF2 rounds for password records
    pub password_iterations: u32,
    pub session_lifetime_secs: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            session_lifetime_secs: DEFAULT_SESSION_LIFETIME_SECS,
        }
    }
}

impl CoreConfig {
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations;
        self
    }

    pub fn with_session_lifetime_secs(mut self, secs: i64) -> Self {
        self.session_lifetime_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.kdf_iterations == 0 {
            return Err(CryptoError::Configuration("kdf_iterations must be >= 1".into()));
        }
        if self.password_iterations == 0 {
            return Err(CryptoError::Configuration(
                "password_iterations must be >= 1".into(),
            ));
        }
        if self.session_lifetime_secs <= 0
            || chrono::Duration::try_seconds(self.session_lifetime_secs).is_none()
        {
            return Err(CryptoError::Configuration(
                "session_lifetime_secs must be positive and in range".into(),
            ));
        }
        Ok(())
    }

    /// Read tunables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read tunables through `lookup`; unset values keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(KDF_ITERATIONS_ENV) {
            config.kdf_iterations = parse_var(KDF_ITERATIONS_ENV, &v)?;
        }
        if let Some(v) = lookup(PASSWORD_ITERATIONS_ENV) {
            config.password_iterations = parse_var(PASSWORD_ITERATIONS_ENV, &v)?;
        }
        if let Some(v) = lookup(SESSION_LIFETIME_ENV) {
            config.session_lifetime_secs = parse_var(SESSION_LIFETIME_ENV, &v)?;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Load the master secret from the process environment
pub fn master_secret_from_env() -> Result<MasterSecret> {
    master_secret_from_lookup(|name| std::env::var(name).ok())
}

pub fn master_secret_from_lookup<F>(lookup: F) -> Result<MasterSecret>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(MASTER_SECRET_ENV).ok_or_else(|| {
        CryptoError::Configuration(format!("{} is not set", MASTER_SECRET_ENV))
    })?;
    // into_bytes keeps the allocation; MasterSecret::new wipes it
    MasterSecret::new(value.into_bytes())
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CryptoError::Configuration(format!("{} has an invalid value", name)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.kdf_iterations, 100_000);
        assert_eq!(config.session_lifetime_secs, 86_400);
    }

    #[test]
    fn test_overrides() {
        let vars = env(&[
            (KDF_ITERATIONS_ENV, "5000"),
            (PASSWORD_ITERATIONS_ENV, " 7000 "),
            (SESSION_LIFETIME_ENV, "60"),
        ]);
        let config = CoreConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.kdf_iterations, 5000);
        assert_eq!(config.password_iterations, 7000);
        assert_eq!(config.session_lifetime_secs, 60);
    }

    #[test]
    fn test_invalid_values() {
        for (k, v) in [
            (KDF_ITERATIONS_ENV, "lots"),
            (KDF_ITERATIONS_ENV, "0"),
            (PASSWORD_ITERATIONS_ENV, "-1"),
            (SESSION_LIFETIME_ENV, "0"),
            (SESSION_LIFETIME_ENV, "9223372036854775807"),
        ] {
            let vars = env(&[(k, v)]);
            let err = CoreConfig::from_lookup(|name| vars.get(name).cloned()).unwrap_err();
            assert!(matches!(err, CryptoError::Configuration(_)), "{k}={v}");
        }
    }

    #[test]
    fn test_master_secret_missing() {
        let err = master_secret_from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, CryptoError::Configuration(_)));
    }

    #[test]
    fn test_master_secret_too_short() {
        let vars = env(&[(MASTER_SECRET_ENV, "sixteen-chars!!!")]);
        let err = master_secret_from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, CryptoError::Configuration(_)));
    }

    #[test]
    fn test_master_secret_ok() {
        let vars = env(&[(MASTER_SECRET_ENV, "a-master-secret-of-thirty-two-ch")]);
        let secret = master_secret_from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(secret.len(), 32);
    }

    #[test]
    fn test_serde_partial() {
        let config: CoreConfig = serde_json::from_str(r#"{"kdf_iterations": 10}"#).unwrap();
        assert_eq!(config.kdf_iterations, 10);
        assert_eq!(config.password_iterations, DEFAULT_PASSWORD_ITERATIONS);
    }
}
