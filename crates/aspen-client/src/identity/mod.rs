//! Caller identities: application credentials, end users and devices

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ensure_not_blank, Error, Result};

/// Caller category an api key is provisioned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Application acting on its own behalf
    Autonomous,
    /// Application acting on behalf of an end user
    Delegated,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Autonomous => f.write_str("Autonomous"),
            Scope::Delegated => f.write_str("Delegated"),
        }
    }
}

/// Application credentials. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AppIdentity {
    pub api_key: String,
    pub api_secret: String,
}

impl AppIdentity {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_not_blank("apiKey", &self.api_key)?;
        ensure_not_blank("apiSecret", &self.api_secret)
    }

    /// Same api key, different secret (after a rotation)
    pub fn with_secret(&self, api_secret: impl Into<String>) -> Self {
        Self::new(self.api_key.clone(), api_secret)
    }
}

impl fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppIdentity")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// End-user credentials for delegated sign-in
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct UserIdentity {
    pub doc_type: String,
    pub doc_number: String,
    pub password: String,
    #[serde(default)]
    pub device_info: Option<DeviceInfo>,
}

impl UserIdentity {
    pub fn new(
        doc_type: impl Into<String>,
        doc_number: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            doc_type: doc_type.into(),
            doc_number: doc_number.into(),
            password: password.into(),
            device_info: None,
        }
    }

    pub fn with_device(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = Some(device_info);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_not_blank("docType", &self.doc_type)?;
        ensure_not_blank("docNumber", &self.doc_number)?;
        ensure_not_blank("password", &self.password)
    }

    /// Username the verifier associates with this user
    pub fn username(&self) -> String {
        format!("{}-{}", self.doc_type, self.doc_number)
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("doc_type", &self.doc_type)
            .field("doc_number", &self.doc_number)
            .field("password", &"<redacted>")
            .field("device_info", &self.device_info)
            .finish()
    }
}

/// Device fingerprint presented on delegated sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DeviceInfo {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: None,
            device_type: None,
            manufacturer: None,
            model: None,
            platform: None,
            version: None,
        }
    }

    /// Describe the current host with a fresh device id
    pub fn generate() -> Self {
        let device_name = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .ok();

        Self {
            device_id: Uuid::new_v4().simple().to_string(),
            device_name,
            device_type: Some("Desktop".to_string()),
            manufacturer: None,
            model: Some(std::env::consts::ARCH.to_string()),
            platform: Some(std::env::consts::OS.to_string()),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Narrow interface over wherever application credentials live
pub trait IdentityProvider: Send + Sync {
    fn app_identity(&self) -> Result<AppIdentity>;
}

impl IdentityProvider for AppIdentity {
    fn app_identity(&self) -> Result<AppIdentity> {
        Ok(self.clone())
    }
}

/// Reads credentials from two environment variables
#[derive(Debug, Clone)]
pub struct EnvironmentIdentity {
    api_key_var: String,
    api_secret_var: String,
}

impl EnvironmentIdentity {
    pub fn new(api_key_var: impl Into<String>, api_secret_var: impl Into<String>) -> Self {
        Self {
            api_key_var: api_key_var.into(),
            api_secret_var: api_secret_var.into(),
        }
    }

    fn read(var: &str) -> Result<String> {
        std::env::var(var)
            .map_err(|e| Error::Config(format!("Environment variable '{}' unavailable: {}", var, e)))
    }
}

impl Default for EnvironmentIdentity {
    fn default() -> Self {
        Self::new("ASPEN_APIKEY", "ASPEN_APISECRET")
    }
}

impl IdentityProvider for EnvironmentIdentity {
    fn app_identity(&self) -> Result<AppIdentity> {
        let identity = AppIdentity::new(Self::read(&self.api_key_var)?, Self::read(&self.api_secret_var)?);
        identity.validate()?;
        Ok(identity)
    }
}
