//! Client-side policy for rotated application secrets
//!
//! Mirrors the verifier's rules so an obviously invalid secret never reaches
//! the network. Violations surface with the same event ids and status the
//! verifier would return.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::protocol::event_ids;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!#$%&()*+,-./:;<=>?@[]^_{|}~";

/// Status the verifier answers policy violations with (Not Acceptable)
pub const POLICY_VIOLATION_STATUS: u16 = 406;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_special: bool,
}

impl Default for SecretPolicy {
    fn default() -> Self {
        Self {
            min_length: 128,
            max_length: 214,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special: true,
        }
    }
}

impl SecretPolicy {
    /// A policy whose minimum exceeds its maximum admits no secret at all
    pub fn check_bounds(&self) -> Result<(), SecretPolicyError> {
        if self.min_length > self.max_length {
            return Err(SecretPolicyError::InvertedBounds {
                min: self.min_length,
                max: self.max_length,
            });
        }
        Ok(())
    }

    pub fn validate(&self, new_secret: &str, current_secret: &str) -> Result<(), SecretPolicyError> {
        self.check_bounds()?;
        if new_secret.trim().is_empty() {
            return Err(SecretPolicyError::Empty);
        }

        let length = new_secret.chars().count();
        if length < self.min_length {
            return Err(SecretPolicyError::TooShort(self.min_length));
        }
        if length > self.max_length {
            return Err(SecretPolicyError::TooLong(self.max_length));
        }

        let has_upper = new_secret.chars().any(|c| c.is_uppercase());
        let has_lower = new_secret.chars().any(|c| c.is_lowercase());
        let has_digit = new_secret.chars().any(|c| c.is_numeric());
        let has_special = new_secret.chars().any(|c| !c.is_alphanumeric());

        if self.require_uppercase && !has_upper {
            return Err(SecretPolicyError::MissingUppercase);
        }
        if self.require_lowercase && !has_lower {
            return Err(SecretPolicyError::MissingLowercase);
        }
        if self.require_numbers && !has_digit {
            return Err(SecretPolicyError::MissingNumber);
        }
        if self.require_special && !has_special {
            return Err(SecretPolicyError::MissingSpecial);
        }

        if new_secret == current_secret {
            return Err(SecretPolicyError::SameAsCurrent);
        }

        Ok(())
    }

    /// Random secret of `length` characters satisfying this policy's
    /// character classes. `length` is clamped to the policy bounds.
    pub fn generate(&self, length: usize) -> Result<String, SecretPolicyError> {
        self.check_bounds()?;
        let length = length.clamp(self.min_length.max(4), self.max_length.max(4));
        let mut rng = rand::thread_rng();

        let required: Vec<&[u8]> = [
            (self.require_uppercase, UPPERCASE),
            (self.require_lowercase, LOWERCASE),
            (self.require_numbers, DIGITS),
            (self.require_special, SPECIAL),
        ]
        .into_iter()
        .filter_map(|(required, class)| required.then_some(class))
        .collect();

        let alphabet: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL].concat();

        let mut bytes: Vec<u8> = required
            .iter()
            .filter_map(|class| class.choose(&mut rng).copied())
            .collect();
        while bytes.len() < length {
            bytes.push(alphabet[rng.gen_range(0..alphabet.len())]);
        }
        bytes.shuffle(&mut rng);

        Ok(bytes.into_iter().map(char::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretPolicyError {
    #[error("'NewValue' must not be empty")]
    Empty,

    #[error("'NewValue' must be at least {0} characters")]
    TooShort(usize),

    #[error("New secret exceeds the maximum allowed length of {0} characters")]
    TooLong(usize),

    #[error("Use complex secrets: combine uppercase and lowercase letters, numbers and special characters (missing uppercase)")]
    MissingUppercase,

    #[error("Use complex secrets: combine uppercase and lowercase letters, numbers and special characters (missing lowercase)")]
    MissingLowercase,

    #[error("Use complex secrets: combine uppercase and lowercase letters, numbers and special characters (missing number)")]
    MissingNumber,

    #[error("Use complex secrets: combine uppercase and lowercase letters, numbers and special characters (missing special character)")]
    MissingSpecial,

    #[error("New secret must be different from the current one")]
    SameAsCurrent,

    #[error("secret_policy.min_length ({min}) exceeds secret_policy.max_length ({max})")]
    InvertedBounds { min: usize, max: usize },
}

impl SecretPolicyError {
    pub fn event_id(&self) -> &'static str {
        match self {
            Self::TooLong(_) => event_ids::SECRET_TOO_LONG,
            _ => event_ids::SECRET_POLICY_VIOLATION,
        }
    }
}

impl From<SecretPolicyError> for ApiError {
    fn from(err: SecretPolicyError) -> Self {
        ApiError::new(err.event_id(), POLICY_VIOLATION_STATUS, err.to_string())
    }
}

impl From<SecretPolicyError> for crate::error::Error {
    fn from(err: SecretPolicyError) -> Self {
        match err {
            SecretPolicyError::InvertedBounds { .. } => Self::Config(err.to_string()),
            _ => Self::Api(err.into()),
        }
    }
}
