//! Staged construction of apps
//!
//! Each stage only exposes what is valid at that point: routing first, then
//! identity, then optional collaborators. Everything is checked in
//! [`ReadyStage::build`], before any request is sent.

use std::fmt;
use std::marker::PhantomData;

use super::Negotiator;
use crate::config::{ClientConfig, Providers};
use crate::error::Result;
use crate::headers::ApiVersion;
use crate::identity::{IdentityProvider, Scope};
use crate::transport::Endpoint;

mod private {
    pub trait Sealed {}
}

/// App kinds the builder can produce
pub trait AppKind: private::Sealed + Sized {
    const SCOPE: Scope;

    #[doc(hidden)]
    fn from_negotiator(negotiator: Negotiator) -> Self;
}

impl private::Sealed for super::AutonomousApp {}
impl private::Sealed for super::DelegatedApp {}

/// First stage: where requests go
pub struct RoutingStage<K> {
    config: ClientConfig,
    _kind: PhantomData<K>,
}

impl<K: AppKind> RoutingStage<K> {
    pub(crate) fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            _kind: PhantomData,
        }
    }

    /// Wire names, routes, signing and policy settings. Defaults apply
    /// when this is never called.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn routing_to(self, endpoint: Endpoint) -> IdentityStage<K> {
        IdentityStage {
            config: self.config,
            endpoint,
            _kind: PhantomData,
        }
    }

    /// Route to the endpoint named in the configuration
    pub fn routing_from_config(self) -> Result<IdentityStage<K>> {
        let endpoint = self.config.endpoint()?;
        Ok(self.routing_to(endpoint))
    }
}

/// Second stage: who is calling
pub struct IdentityStage<K> {
    config: ClientConfig,
    endpoint: Endpoint,
    _kind: PhantomData<K>,
}

impl<K: AppKind> IdentityStage<K> {
    pub fn with_identity(self, provider: impl IdentityProvider + 'static) -> ReadyStage<K> {
        let api_version = self.config.api_version.clone();
        ReadyStage {
            config: self.config,
            endpoint: self.endpoint,
            identity: Box::new(provider),
            providers: Providers::default(),
            api_version,
            _kind: PhantomData,
        }
    }
}

/// Final stage: optional collaborators, then `build`
pub struct ReadyStage<K> {
    config: ClientConfig,
    endpoint: Endpoint,
    identity: Box<dyn IdentityProvider>,
    providers: Providers,
    api_version: Option<String>,
    _kind: PhantomData<K>,
}

impl<K: AppKind> ReadyStage<K> {
    pub fn with_providers(mut self, providers: Providers) -> Self {
        self.providers = providers;
        self
    }

    /// `major.minor[.patch[.build]]`; blank restores the server default
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn build(self) -> Result<K> {
        let identity = self.identity.app_identity()?;
        identity.validate()?;
        self.config.secret_policy.check_bounds()?;

        let api_version = ApiVersion::parse_optional(self.api_version.as_deref())?
            .map(|version| version.to_string());
        let composer = self.providers.resolve_header_composer(&self.config)?;
        let transport = self
            .providers
            .resolve_transport(&self.endpoint, self.config.proxy.as_deref())?;

        Ok(K::from_negotiator(Negotiator {
            scope: K::SCOPE,
            identity,
            endpoint: self.endpoint,
            api_version,
            routes: self.config.routes.clone(),
            claim_names: self.config.claims.clone(),
            secret_policy: self.config.secret_policy.clone(),
            signer: self.config.signer()?,
            composer,
            transport,
            token_cache: self.providers.token_cache,
        }))
    }
}

impl<K> fmt::Debug for ReadyStage<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyStage")
            .field("endpoint", &self.endpoint)
            .field("providers", &self.providers)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}
