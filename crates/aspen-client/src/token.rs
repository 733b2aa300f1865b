//! Authentication tokens issued on sign-in

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::claims::ClaimSet;
use crate::error::{Error, Result};
use crate::identity::Scope;
use crate::jwt::JwtSigner;
use crate::protocol::ClaimNames;

/// Claim carrying the token expiry inside the sign-in response
pub const EXPIRES_AT_CLAIM: &str = "ExpiresAt";

/// Server-issued credential proving a prior successful sign-in
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    api_key: String,
    token: String,
    expires_at: DateTime<Utc>,
    scope: Scope,
    username: Option<String>,
    device_id: Option<String>,
}

impl AuthToken {
    pub fn new(
        api_key: impl Into<String>,
        token: impl Into<String>,
        expires_at: DateTime<Utc>,
        scope: Scope,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            token: token.into(),
            expires_at,
            scope,
            username: None,
            device_id: None,
        }
    }

    pub fn with_user(mut self, username: impl Into<String>, device_id: Option<String>) -> Self {
        self.username = Some(username.into());
        self.device_id = device_id;
        self
    }

    /// Decode a sign-in response body.
    ///
    /// The body is a JSON string holding a compact token signed with the
    /// application secret. The signature is verified before any claim is
    /// trusted.
    pub fn from_signin_response(
        body: &str,
        api_key: &str,
        api_secret: &str,
        scope: Scope,
        signer: &JwtSigner,
        names: &ClaimNames,
    ) -> Result<Self> {
        let compact = match serde_json::from_str::<Value>(body) {
            Ok(Value::String(compact)) => compact,
            Ok(other) => {
                return Err(Error::InvalidResponse(format!(
                    "expected a JSON string, found {}",
                    json_kind(&other)
                )))
            }
            Err(_) => body.trim().to_string(),
        };

        let claims = signer.decode(&compact, api_secret)?;
        let token = required_str(&claims, &names.token)?;
        let expires_at = expiry(&claims)?;

        Ok(Self {
            api_key: api_key.to_string(),
            token,
            expires_at,
            scope,
            username: claims.get_str(&names.username).map(str::to_string),
            device_id: claims.get_str(&names.device_id).map(str::to_string),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("api_key", &self.api_key)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("username", &self.username)
            .field("device_id", &self.device_id)
            .finish()
    }
}

fn required_str(claims: &ClaimSet, name: &str) -> Result<String> {
    match claims.get_str(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(Error::InvalidResponse(format!("sign-in response lacks '{}'", name))),
    }
}

/// RFC 3339 timestamp, or Unix seconds
fn expiry(claims: &ClaimSet) -> Result<DateTime<Utc>> {
    match claims.get(EXPIRES_AT_CLAIM) {
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::InvalidResponse(format!("'{}': {}", EXPIRES_AT_CLAIM, e))),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| Error::InvalidResponse(format!("'{}' out of range", EXPIRES_AT_CLAIM))),
        _ => Err(Error::InvalidResponse(format!(
            "sign-in response lacks '{}'",
            EXPIRES_AT_CLAIM
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
