//! Compact HMAC JWS encoding of claim sets

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::claims::ClaimSet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    /// Not three dot-separated base64url segments, or a segment does not
    /// decode to the expected JSON
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Structurally valid, but signed with a different secret
    #[error("Invalid signature")]
    SignatureMismatch,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Signing secret must not be empty")]
    MissingSecret,

    #[error("Encoding failed: {0}")]
    Encoding(String),
}

/// Signer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    pub algorithm: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
        }
    }
}

/// Signs claim sets with the application secret and verifies received tokens
#[derive(Debug, Clone)]
pub struct JwtSigner {
    header: Header,
}

impl JwtSigner {
    pub fn new(config: &SignerConfig) -> Result<Self, JwtError> {
        let algorithm = match config.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => return Err(JwtError::UnsupportedAlgorithm(other.to_string())),
        };

        Ok(Self {
            header: Header::new(algorithm),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.header.alg
    }

    pub fn encode(&self, claims: &ClaimSet, secret: &str) -> Result<String, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::MissingSecret);
        }

        encode(&self.header, claims.as_map(), &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    /// Verify the signature and return the claims. Expiry and audience are
    /// not checked here: the claim sets of this protocol carry neither.
    pub fn decode(&self, token: &str, secret: &str) -> Result<ClaimSet, JwtError> {
        check_structure(token)?;
        if secret.is_empty() {
            return Err(JwtError::MissingSecret);
        }

        let mut validation = Validation::new(self.header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => JwtError::SignatureMismatch,
            ErrorKind::InvalidAlgorithm => {
                JwtError::Malformed(format!("expected {:?} signature", self.header.alg))
            }
            _ => JwtError::Malformed(e.to_string()),
        })?;

        Ok(ClaimSet::from(data.claims))
    }
}

impl Default for JwtSigner {
    fn default() -> Self {
        Self {
            header: Header::new(Algorithm::HS256),
        }
    }
}

/// Three non-empty base64url segments whose first two are JSON objects
fn check_structure(token: &str) -> Result<(), JwtError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(JwtError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(JwtError::Malformed(format!("segment {} is empty", index)));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|e| JwtError::Malformed(format!("segment {}: {}", index, e)))?;
        if index < 2 {
            serde_json::from_slice::<Map<String, Value>>(&bytes)
                .map_err(|e| JwtError::Malformed(format!("segment {}: {}", index, e)))?;
        }
    }

    Ok(())
}
