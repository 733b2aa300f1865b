//! Client configuration and injected collaborators

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{DeviceInfoCache, TokenCache};
use crate::claims::{
    DefaultPayloadClaimsManager, EpochGenerator, NonceGenerator, PayloadBuilder,
    PayloadClaimsManager, UnixEpochGenerator, UuidNonceGenerator,
};
use crate::error::{Error, Result};
use crate::headers::{DefaultHeaderComposer, HeaderComposer};
use crate::jwt::{JwtSigner, SignerConfig};
use crate::logging::LoggingConfig;
use crate::protocol::{ClaimNames, HeaderNames, Routes};
use crate::secret_policy::SecretPolicy;
use crate::transport::{Endpoint, ReqwestTransport, Transport, DEFAULT_TIMEOUT};

/// Prefix of the environment variables read by [`ClientConfig::load`]
pub const ENV_PREFIX: &str = "ASPEN";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: EndpointConfig,
    /// Requested API version; absent means server default
    pub api_version: Option<String>,
    pub proxy: Option<String>,
    pub headers: HeaderNames,
    pub claims: ClaimNames,
    pub routes: Routes,
    pub signing: SignerConfig,
    pub secret_policy: SecretPolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl ClientConfig {
    /// Layer an optional file (format from its extension) under
    /// `ASPEN__SECTION__KEY` environment variables.
    ///
    /// Environment values stay strings until deserialized so a version like
    /// `1.10` is not read as a float.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.secret_policy.check_bounds()?;
        Ok(loaded)
    }

    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// The configured endpoint; a url is mandatory
    pub fn endpoint(&self) -> Result<Endpoint> {
        let url = self
            .endpoint
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::Config("endpoint.url is not set".to_string()))?;
        Endpoint::new(url, Some(Duration::from_secs(self.endpoint.timeout_secs)))
    }

    pub fn signer(&self) -> Result<JwtSigner> {
        Ok(JwtSigner::new(&self.signing)?)
    }
}

/// Collaborators a session is built from.
///
/// Every field defaults to the production implementation. Tests replace only
/// what they need, e.g. a misbehaving nonce generator or an in-process
/// transport.
#[derive(Clone)]
pub struct Providers {
    pub nonce_generator: Arc<dyn NonceGenerator>,
    pub epoch_generator: Arc<dyn EpochGenerator>,
    pub claims_manager: Arc<dyn PayloadClaimsManager>,
    /// Replaces the whole header composition, bypassing the three above
    pub header_composer: Option<Arc<dyn HeaderComposer>>,
    pub token_cache: Arc<TokenCache>,
    pub device_cache: Arc<DeviceInfoCache>,
    /// Defaults to a blocking HTTP client for the configured endpoint
    pub transport: Option<Arc<dyn Transport>>,
}

impl Default for Providers {
    fn default() -> Self {
        Self {
            nonce_generator: Arc::new(UuidNonceGenerator),
            epoch_generator: Arc::new(UnixEpochGenerator),
            claims_manager: Arc::new(DefaultPayloadClaimsManager),
            header_composer: None,
            token_cache: TokenCache::shared(),
            device_cache: DeviceInfoCache::shared(),
            transport: None,
        }
    }
}

impl Providers {
    /// Production collaborators with private caches instead of the
    /// process-wide ones
    pub fn isolated() -> Self {
        Self {
            token_cache: Arc::new(TokenCache::new()),
            device_cache: Arc::new(DeviceInfoCache::new()),
            ..Self::default()
        }
    }

    pub fn with_nonce_generator(mut self, generator: impl NonceGenerator + 'static) -> Self {
        self.nonce_generator = Arc::new(generator);
        self
    }

    pub fn with_epoch_generator(mut self, generator: impl EpochGenerator + 'static) -> Self {
        self.epoch_generator = Arc::new(generator);
        self
    }

    pub fn with_claims_manager(mut self, manager: impl PayloadClaimsManager + 'static) -> Self {
        self.claims_manager = Arc::new(manager);
        self
    }

    pub fn with_header_composer(mut self, composer: impl HeaderComposer + 'static) -> Self {
        self.header_composer = Some(Arc::new(composer));
        self
    }

    pub fn with_token_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.token_cache = cache;
        self
    }

    pub fn with_device_cache(mut self, cache: Arc<DeviceInfoCache>) -> Self {
        self.device_cache = cache;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub(crate) fn resolve_header_composer(&self, config: &ClientConfig) -> Result<Arc<dyn HeaderComposer>> {
        if let Some(composer) = &self.header_composer {
            return Ok(Arc::clone(composer));
        }

        let payload = PayloadBuilder::new(
            Arc::clone(&self.nonce_generator),
            Arc::clone(&self.epoch_generator),
            Arc::clone(&self.claims_manager),
            config.claims.clone(),
        );
        Ok(Arc::new(DefaultHeaderComposer::new(
            payload,
            config.signer()?,
            config.headers.clone(),
            Arc::clone(&self.device_cache),
        )))
    }

    pub(crate) fn resolve_transport(
        &self,
        endpoint: &Endpoint,
        proxy: Option<&str>,
    ) -> Result<Arc<dyn Transport>> {
        match &self.transport {
            Some(transport) => Ok(Arc::clone(transport)),
            None => Ok(Arc::new(ReqwestTransport::new(endpoint.clone(), proxy)?)),
        }
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers")
            .field("header_composer", &self.header_composer.is_some())
            .field("token_cache", &self.token_cache.len())
            .field("device_cache", &self.device_cache.get().is_some())
            .field("transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}
