//! Outbound authentication headers
//!
//! Each header is added independently and replaces any earlier value under
//! the same name, so a request can be assembled with any combination of
//! present, absent or malformed headers.

pub mod version;

pub use version::ApiVersion;

use std::sync::Arc;

use tracing::trace;

use crate::cache::DeviceInfoCache;
use crate::claims::{ClaimSet, PayloadBuilder};
use crate::error::{ensure_not_blank, Result};
use crate::identity::UserIdentity;
use crate::jwt::JwtSigner;
use crate::protocol::HeaderNames;
use crate::transport::ApiRequest;

pub trait HeaderComposer: Send + Sync {
    fn add_api_key_header(&self, request: &mut ApiRequest, api_key: &str) -> Result<()>;

    /// `None` or blank leaves the header off and the server picks its default
    fn add_api_version_header(&self, request: &mut ApiRequest, version: Option<&str>) -> Result<()>;

    /// Sign-in payload; with a user, also the device-info header
    fn add_signin_payload_header(
        &self,
        request: &mut ApiRequest,
        api_secret: &str,
        user: Option<&UserIdentity>,
    ) -> Result<()>;

    /// Token-bearing payload; with a username, the user-signed variant
    fn add_signed_payload_header(
        &self,
        request: &mut ApiRequest,
        api_secret: &str,
        token: &str,
        username: Option<&str>,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DefaultHeaderComposer {
    payload: PayloadBuilder,
    signer: JwtSigner,
    names: HeaderNames,
    device_cache: Arc<DeviceInfoCache>,
}

impl DefaultHeaderComposer {
    pub fn new(
        payload: PayloadBuilder,
        signer: JwtSigner,
        names: HeaderNames,
        device_cache: Arc<DeviceInfoCache>,
    ) -> Self {
        Self {
            payload,
            signer,
            names,
            device_cache,
        }
    }

    pub fn names(&self) -> &HeaderNames {
        &self.names
    }

    fn set_payload(&self, request: &mut ApiRequest, claims: &ClaimSet, secret: &str) -> Result<()> {
        let payload = self.signer.encode(claims, secret)?;
        trace!(claims = ?claims.names().collect::<Vec<_>>(), "Signed payload");
        request.set_header(&self.names.payload, &payload)
    }
}

impl Default for DefaultHeaderComposer {
    fn default() -> Self {
        Self::new(
            PayloadBuilder::default(),
            JwtSigner::default(),
            HeaderNames::default(),
            DeviceInfoCache::shared(),
        )
    }
}

impl HeaderComposer for DefaultHeaderComposer {
    fn add_api_key_header(&self, request: &mut ApiRequest, api_key: &str) -> Result<()> {
        ensure_not_blank("apiKey", api_key)?;
        request.set_header(&self.names.api_key, api_key)
    }

    fn add_api_version_header(&self, request: &mut ApiRequest, version: Option<&str>) -> Result<()> {
        match ApiVersion::parse_optional(version)? {
            Some(version) => request.set_header(&self.names.api_version, &version.to_string()),
            None => Ok(()),
        }
    }

    fn add_signin_payload_header(
        &self,
        request: &mut ApiRequest,
        api_secret: &str,
        user: Option<&UserIdentity>,
    ) -> Result<()> {
        ensure_not_blank("apiSecret", api_secret)?;

        let claims = match user {
            None => self.payload.signin_claims(),
            Some(user) => {
                user.validate()?;
                let device = self.device_cache.resolve(user.device_info.as_ref());
                request.set_header(&self.names.device_info, &device.to_json()?)?;
                self.payload.delegated_signin_claims(user, &device.device_id)
            }
        };

        self.set_payload(request, &claims, api_secret)
    }

    fn add_signed_payload_header(
        &self,
        request: &mut ApiRequest,
        api_secret: &str,
        token: &str,
        username: Option<&str>,
    ) -> Result<()> {
        ensure_not_blank("apiSecret", api_secret)?;
        ensure_not_blank("token", token)?;

        let claims = match username {
            None => self.payload.signed_claims(token),
            Some(username) => {
                ensure_not_blank("username", username)?;
                let device = self.device_cache.resolve(None);
                self.payload
                    .delegated_signed_claims(token, username, &device.device_id)
            }
        };

        self.set_payload(request, &claims, api_secret)
    }
}
