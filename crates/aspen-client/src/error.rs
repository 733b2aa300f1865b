//! Error types for signing and session operations

use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::jwt::JwtError;
use crate::protocol::event_ids;

#[derive(Debug, Error)]
pub enum Error {
    /// Failure reported by (or mirrored from) the remote verifier
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("JWT error: {0}")]
    Jwt(#[from] JwtError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// The protocol error, if this is one
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Reject `None`, empty and whitespace-only values before a request is built
pub(crate) fn ensure_not_blank(name: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_argument(name, "must not be null or empty"));
    }
    Ok(())
}

/// Typed protocol failure: stable event id, HTTP status and message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (eventId: {}, status: {status_code})", .event_id.as_deref().unwrap_or("n/a"))]
pub struct ApiError {
    pub event_id: Option<String>,
    pub status_code: u16,
    pub message: String,
}

/// Body shape of a failed response
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(
        rename = "eventId",
        alias = "EventId",
        default,
        deserialize_with = "event_id_text"
    )]
    event_id: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Event ids arrive as `"15851"` or `15851` depending on the verifier
fn event_id_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

impl ApiError {
    pub fn new(event_id: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id.into()),
            status_code,
            message: message.into(),
        }
    }

    /// Map a non-success response onto the typed error. The status line is
    /// authoritative; the body contributes the event id and message.
    pub fn from_response(status_code: u16, body: &str) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let (event_id, message) = match parsed {
            Some(ErrorBody { event_id, message }) => (event_id, message),
            None => (None, None),
        };
        let message = message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                reqwest::StatusCode::from_u16(status_code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unexpected response")
                    .to_string()
            });

        Self {
            event_id,
            status_code,
            message,
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::classify(self.event_id(), self.status_code)
    }
}

/// Identity failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityFailure {
    Unrecognized,
    ScopeMismatch,
    Disabled,
    SecretRotationRequired,
}

/// Client-observable failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing/blank api-key or payload header, malformed api version
    HeaderFormat,
    /// Payload is not a signed token or the signature does not match
    Signature,
    /// Missing, empty or malformed claim; nonce reuse
    ClaimValidation,
    /// Claim well formed but out of range (epoch drift)
    ClaimOutOfRange,
    Identity(IdentityFailure),
    /// No valid token, expired token, token owned by another application
    TokenLifecycle,
    SecretPolicy,
    /// End-user credential failures on delegated sign-in
    UserCredentials,
    Unclassified,
}

impl ErrorCategory {
    pub fn classify(event_id: Option<&str>, status_code: u16) -> Self {
        use event_ids::*;

        match event_id {
            Some(REQUIRED_HEADER_MISSING)
            | Some(API_KEY_HEADER_MISSING)
            | Some(PAYLOAD_HEADER_MISSING)
            | Some(API_VERSION_INVALID)
            | Some(API_VERSION_UNSUPPORTED) => Self::HeaderFormat,
            Some(PAYLOAD_INVALID) => Self::Signature,
            Some(CLAIM_INVALID) | Some(EPOCH_FORMAT_INVALID) => Self::ClaimValidation,
            Some(EPOCH_OUT_OF_RANGE) => Self::ClaimOutOfRange,
            Some(API_KEY_UNRECOGNIZED) => Self::Identity(IdentityFailure::Unrecognized),
            Some(SCOPE_MISMATCH) => Self::Identity(IdentityFailure::ScopeMismatch),
            Some(API_KEY_DISABLED) => Self::Identity(IdentityFailure::Disabled),
            Some(SECRET_ROTATION_REQUIRED) => {
                Self::Identity(IdentityFailure::SecretRotationRequired)
            }
            Some(TOKEN_MISMATCH) | Some(TOKEN_NOT_FOUND) | Some(TOKEN_EXPIRED) => {
                Self::TokenLifecycle
            }
            Some(SECRET_POLICY_VIOLATION) | Some(SECRET_TOO_LONG) => Self::SecretPolicy,
            Some(USER_UNRECOGNIZED)
            | Some(USER_LOCKED)
            | Some(USER_INVALID_CREDENTIALS)
            | Some(USER_LOCKED_OUT_BY_ATTEMPTS)
            | Some(USER_CREDENTIALS_MISSING)
            | Some(USER_CREDENTIALS_UNVERIFIABLE) => Self::UserCredentials,
            _ => match status_code {
                401 => Self::TokenLifecycle,
                406 => Self::SecretPolicy,
                416 => Self::ClaimOutOfRange,
                _ => Self::Unclassified,
            },
        }
    }

    /// Whether the caller is expected to re-authenticate before retrying
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::TokenLifecycle)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::HeaderFormat => "header-format",
            Self::Signature => "signature",
            Self::ClaimValidation => "claim-validation",
            Self::ClaimOutOfRange => "claim-out-of-range",
            Self::Identity(IdentityFailure::Unrecognized) => "identity-unrecognized",
            Self::Identity(IdentityFailure::ScopeMismatch) => "identity-scope-mismatch",
            Self::Identity(IdentityFailure::Disabled) => "identity-disabled",
            Self::Identity(IdentityFailure::SecretRotationRequired) => "identity-rotation-required",
            Self::TokenLifecycle => "token-lifecycle",
            Self::SecretPolicy => "secret-policy",
            Self::UserCredentials => "user-credentials",
            Self::Unclassified => "unclassified",
        };
        f.write_str(label)
    }
}
