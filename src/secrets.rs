//! Token signing secret
//!
//! The secret is read from the environment into a `Zeroizing<String>` so it
//! is wiped from memory when dropped.

use std::env;
use tracing::{error, info};
use zeroize::Zeroizing;

/// Environment variable holding the token signing secret
pub const TOKEN_SECRET_VAR: &str = "TOKEN_SECRET";

/// 256 bits
pub const MIN_SECRET_LENGTH: usize = 32;

/// Error type for secret loading operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

/// Load and validate the token signing secret from `TOKEN_SECRET`
pub fn load_token_secret() -> Result<Zeroizing<String>, SecretError> {
    let secret = load_from_env(TOKEN_SECRET_VAR)?;
    validate_secret_strength(&secret, MIN_SECRET_LENGTH).map_err(|e| {
        error!("{} rejected: {}", TOKEN_SECRET_VAR, e);
        e
    })?;
    info!("✓ Token signing secret loaded");
    Ok(secret)
}

/// Load a secret from environment variable (wrapped in Zeroizing)
fn load_from_env(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    env::var(env_var_name)
        .map(Zeroizing::new)
        .map_err(|_| SecretError::EnvVarNotSet(env_var_name.to_string()))
}

/// Validate that a secret meets minimum security requirements
pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), SecretError> {
    if secret.len() < min_length {
        return Err(SecretError::ValidationFailed(format!(
            "Secret too short: {} bytes (minimum: {})",
            secret.len(),
            min_length
        )));
    }

    let weak_patterns = ["changeme", "placeholder", "example", "12345678"];
    let secret_lower = secret.to_lowercase();

    for pattern in &weak_patterns {
        if secret_lower.contains(pattern) {
            return Err(SecretError::ValidationFailed(format!(
                "Secret contains weak pattern: {}",
                pattern
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("short", 32).is_err());
        assert!(validate_secret_strength("changeme-changeme-changeme-changeme", 32).is_err());

        let strong = "q7Vb2Lr9xW4mZt1Kc8Np3Hs6Jd0Fg5Ya";
        assert_eq!(strong.len(), 32);
        assert!(validate_secret_strength(strong, 32).is_ok());
    }

    #[test]
    fn test_load_from_env_missing() {
        assert_eq!(
            load_from_env("LOYALTY_LEDGER_UNSET_SECRET_VAR"),
            Err(SecretError::EnvVarNotSet(
                "LOYALTY_LEDGER_UNSET_SECRET_VAR".to_string()
            ))
        );
    }

    #[test]
    fn test_load_from_env_present() {
        env::set_var("LOYALTY_LEDGER_TEST_SECRET", "q7Vb2Lr9xW4mZt1Kc8Np3Hs6Jd0Fg5Ya");
        let secret = load_from_env("LOYALTY_LEDGER_TEST_SECRET").unwrap();
        assert_eq!(secret.as_str(), "q7Vb2Lr9xW4mZt1Kc8Np3Hs6Jd0Fg5Ya");
        env::remove_var("LOYALTY_LEDGER_TEST_SECRET");
    }
}
