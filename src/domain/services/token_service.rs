//! Bearer token issuance and verification.
//!
//! Tokens are HMAC-signed JWTs carrying `{login, iat}` and, when a TTL is
//! configured, `exp`. Only the algorithms in [`SigningAlgorithm`] are ever
//! accepted; the header is inspected before any signature work.

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::domain::errors::LedgerError;

/// Closed set of supported signing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Hs256,
    Hs384,
    Hs512,
}

impl SigningAlgorithm {
    fn to_jwt(self) -> Algorithm {
        match self {
            SigningAlgorithm::Hs256 => Algorithm::HS256,
            SigningAlgorithm::Hs384 => Algorithm::HS384,
            SigningAlgorithm::Hs512 => Algorithm::HS512,
        }
    }

    fn from_jwt(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::HS256 => Some(SigningAlgorithm::Hs256),
            Algorithm::HS384 => Some(SigningAlgorithm::Hs384),
            Algorithm::HS512 => Some(SigningAlgorithm::Hs512),
            _ => None,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "HS384" => Ok(SigningAlgorithm::Hs384),
            "HS512" => Ok(SigningAlgorithm::Hs512),
            other => Err(format!("unsupported signing algorithm '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub algorithm: SigningAlgorithm,
    /// `None` issues tokens that never expire
    pub ttl: Option<Duration>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm::Hs256,
            ttl: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    login: String,
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: TokenConfig,
}

impl TokenService {
    pub fn new(secret: &[u8], config: TokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            config,
        }
    }

    /// Sign a token for `login`
    pub fn issue(&self, login: &str) -> Result<String, LedgerError> {
        let issued_at = Utc::now().timestamp();
        let expires_at = self
            .config
            .ttl
            .map(|ttl| issued_at + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2));

        let claims = Claims {
            login: login.to_string(),
            iat: issued_at,
            exp: expires_at,
        };

        encode(&Header::new(self.config.algorithm.to_jwt()), &claims, &self.encoding_key).map_err(
            |e| {
                error!("Failed to sign token for '{}': {}", login, e);
                LedgerError::Internal
            },
        )
    }

    /// Verify signature (and expiry, when configured) and return the login claim
    pub fn verify(&self, token: &str) -> Result<String, LedgerError> {
        let header = decode_header(token).map_err(|e| {
            debug!("Rejected token with unreadable header: {}", e);
            LedgerError::Unauthorized
        })?;

        let algorithm = SigningAlgorithm::from_jwt(header.alg).ok_or_else(|| {
            warn!("Rejected token signed with unexpected algorithm {:?}", header.alg);
            LedgerError::Unauthorized
        })?;

        let mut validation = Validation::new(algorithm.to_jwt());
        validation.required_spec_claims.clear();
        validation.validate_exp = self.config.ttl.is_some();
        if validation.validate_exp {
            validation.required_spec_claims.insert("exp".to_string());
        }

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!("Rejected token: {}", e);
            LedgerError::Unauthorized
        })?;

        Ok(data.claims.login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"an-adequately-long-test-signing-secret";

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new(SECRET, TokenConfig::default());
        let token = service.issue("alice").unwrap();
        assert_eq!(service.verify(&token).unwrap(), "alice");
    }

    #[test]
    fn test_every_supported_algorithm_round_trips() {
        for algorithm in [
            SigningAlgorithm::Hs256,
            SigningAlgorithm::Hs384,
            SigningAlgorithm::Hs512,
        ] {
            let service = TokenService::new(
                SECRET,
                TokenConfig {
                    algorithm,
                    ttl: None,
                },
            );
            let token = service.issue("bob").unwrap();
            assert_eq!(service.verify(&token).unwrap(), "bob");
        }
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let issuer = TokenService::new(SECRET, TokenConfig::default());
        let verifier = TokenService::new(b"some-other-secret-of-sufficient-size", TokenConfig::default());
        let token = issuer.issue("alice").unwrap();
        assert_eq!(verifier.verify(&token), Err(LedgerError::Unauthorized));
    }

    #[test]
    fn test_tampered_token_is_unauthorized() {
        let service = TokenService::new(SECRET, TokenConfig::default());
        let token = service.issue("alice").unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert_eq!(service.verify(&tampered), Err(LedgerError::Unauthorized));
        assert_eq!(service.verify("not-a-token"), Err(LedgerError::Unauthorized));
        assert_eq!(service.verify(""), Err(LedgerError::Unauthorized));
    }

    #[test]
    fn test_unsigned_token_is_unauthorized() {
        // {"alg":"none","typ":"JWT"} . {"login":"alice","iat":0} . <empty>
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJsb2dpbiI6ImFsaWNlIiwiaWF0IjowfQ.";
        let service = TokenService::new(SECRET, TokenConfig::default());
        assert_eq!(service.verify(token), Err(LedgerError::Unauthorized));
    }

    #[test]
    fn test_token_without_expiry_is_accepted_when_ttl_unset() {
        let service = TokenService::new(SECRET, TokenConfig::default());
        let token = service.issue("carol").unwrap();
        assert!(service.verify(&token).is_ok());
    }

    #[test]
    fn test_expiry_enforced_when_ttl_set() {
        let no_expiry = TokenService::new(SECRET, TokenConfig::default());
        let with_expiry = TokenService::new(
            SECRET,
            TokenConfig {
                algorithm: SigningAlgorithm::Hs256,
                ttl: Some(Duration::from_secs(3600)),
            },
        );

        // a token without exp is refused once expiry is required
        let legacy = no_expiry.issue("dave").unwrap();
        assert_eq!(with_expiry.verify(&legacy), Err(LedgerError::Unauthorized));

        let fresh = with_expiry.issue("dave").unwrap();
        assert_eq!(with_expiry.verify(&fresh).unwrap(), "dave");
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("HS256".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs256));
        assert_eq!("hs512".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs512));
        assert!("RS256".parse::<SigningAlgorithm>().is_err());
        assert!("none".parse::<SigningAlgorithm>().is_err());
    }
}
