//! Wire contract pinned to one protocol version
//!
//! Header names, claim names, routes and event ids are plain configuration
//! values. Every default here matches the current remote verifier; a
//! deployment that speaks a different revision overrides them through
//! [`ClientConfig`](crate::config::ClientConfig) instead of the client
//! carrying several historical variants at once.

use serde::{Deserialize, Serialize};

/// Custom HTTP header names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderNames {
    /// Carries the plain api key
    pub api_key: String,
    /// Carries the signed claim set
    pub payload: String,
    /// Requested API version (optional on the wire)
    pub api_version: String,
    /// JSON encoded device description, sign-in requests only
    pub device_info: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            api_key: "X-PRO-Auth-App".to_string(),
            payload: "X-PRO-Auth-Payload".to_string(),
            api_version: "X-PRO-Api-Version".to_string(),
            device_info: "X-PRO-Auth-DeviceInfo".to_string(),
        }
    }
}

/// Claim names used inside the signed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimNames {
    pub nonce: String,
    pub epoch: String,
    pub token: String,
    pub username: String,
    pub device_id: String,
    pub doc_type: String,
    pub doc_number: String,
    pub password: String,
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self {
            nonce: "Nonce".to_string(),
            epoch: "Epoch".to_string(),
            token: "Token".to_string(),
            username: "Username".to_string(),
            device_id: "DeviceId".to_string(),
            doc_type: "DocType".to_string(),
            doc_number: "DocNumber".to_string(),
            password: "Password".to_string(),
        }
    }
}

/// Resource paths relative to the endpoint base url
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub autonomous_root: String,
    pub delegated_root: String,
    pub signin: String,
    pub update_secret: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            autonomous_root: "/app".to_string(),
            delegated_root: "/me".to_string(),
            signin: "/auth/signin".to_string(),
            update_secret: "/auth/secret".to_string(),
        }
    }
}

impl Routes {
    /// Join a scope root with a relative resource, normalising slashes
    pub fn join(root: &str, resource: &str) -> String {
        format!(
            "/{}/{}",
            root.trim_matches('/'),
            resource.trim_start_matches('/').trim_end_matches('/')
        )
    }
}

/// Stable machine-readable failure codes returned by the verifier
pub mod event_ids {
    /// A required custom header is missing, empty or blank
    pub const REQUIRED_HEADER_MISSING: &str = "20002";
    /// Api key header missing (delegated edition of the same check)
    pub const API_KEY_HEADER_MISSING: &str = "15842";
    /// Payload header missing (delegated edition of the same check)
    pub const PAYLOAD_HEADER_MISSING: &str = "15845";
    /// The api key is not recognised
    pub const API_KEY_UNRECOGNIZED: &str = "20005";
    /// The payload header is not a valid signed token, or its signature
    /// does not match the secret on file
    pub const PAYLOAD_INVALID: &str = "20007";
    /// The api key is recognised but provisioned for another scope
    pub const SCOPE_MISMATCH: &str = "1000478";
    /// The api key is disabled
    pub const API_KEY_DISABLED: &str = "20006";
    /// The application must rotate its secret before continuing
    pub const SECRET_ROTATION_REQUIRED: &str = "20009";
    /// A required claim is missing, empty or does not match its pattern;
    /// also used for an already processed nonce
    pub const CLAIM_INVALID: &str = "15852";
    /// Epoch claim is not a number
    pub const EPOCH_FORMAT_INVALID: &str = "15850";
    /// Epoch claim is outside the admissible drift window
    pub const EPOCH_OUT_OF_RANGE: &str = "15851";
    /// Token claims do not match the calling application
    pub const TOKEN_MISMATCH: &str = "15846";
    /// No valid token on file for the application
    pub const TOKEN_NOT_FOUND: &str = "15847";
    /// The provided token has expired
    pub const TOKEN_EXPIRED: &str = "15848";
    /// New secret violates the secret policy
    pub const SECRET_POLICY_VIOLATION: &str = "15864";
    /// New secret exceeds the maximum length
    pub const SECRET_TOO_LONG: &str = "15892";
    /// Api version header is malformed
    pub const API_VERSION_INVALID: &str = "99001";
    /// Api version header is well formed but not supported
    pub const API_VERSION_UNSUPPORTED: &str = "99005";
    /// End-user credential failures on delegated sign-in
    pub const USER_UNRECOGNIZED: &str = "97412";
    pub const USER_LOCKED: &str = "97413";
    pub const USER_INVALID_CREDENTIALS: &str = "97414";
    pub const USER_LOCKED_OUT_BY_ATTEMPTS: &str = "97415";
    pub const USER_CREDENTIALS_MISSING: &str = "97416";
    pub const USER_CREDENTIALS_UNVERIFIABLE: &str = "97417";
}
