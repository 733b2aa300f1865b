//! Applications acting on their own behalf

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::builder::{AppKind, RoutingStage};
use super::{CachePolicy, Negotiator, SessionState};
use crate::error::Result;
use crate::identity::Scope;
use crate::token::AuthToken;
use crate::transport::{ApiRequest, Endpoint};

/// An autonomous app that has not authenticated yet
///
/// ```no_run
/// use aspen_client::{AppIdentity, AutonomousApp, CachePolicy, Endpoint, ApiRequest};
///
/// # fn main() -> aspen_client::Result<()> {
/// let app = AutonomousApp::builder()
///     .routing_to(Endpoint::new("https://aspen.example.com/api", None)?)
///     .with_identity(AppIdentity::new("my-api-key", "my-api-secret"))
///     .with_api_version("1.0")
///     .build()?;
///
/// let session = app.authenticate(CachePolicy::CacheIfAvailable)?;
/// let settings: Option<serde_json::Value> = session.execute(ApiRequest::get("/settings"))?;
/// # let _ = settings;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AutonomousApp {
    negotiator: Negotiator,
}

impl AppKind for AutonomousApp {
    const SCOPE: Scope = Scope::Autonomous;

    fn from_negotiator(negotiator: Negotiator) -> Self {
        Self { negotiator }
    }
}

impl AutonomousApp {
    pub fn builder() -> RoutingStage<Self> {
        RoutingStage::new()
    }

    pub fn api_key(&self) -> &str {
        self.negotiator.api_key()
    }

    pub fn scope(&self) -> Scope {
        self.negotiator.scope()
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.negotiator.endpoint()
    }

    pub fn state(&self) -> SessionState {
        SessionState::Unauthenticated
    }

    /// Obtain a token, from the cache when the policy allows it
    pub fn authenticate(&self, policy: CachePolicy) -> Result<AutonomousSession> {
        let token = self.negotiator.signin(None, policy)?;
        Ok(AutonomousSession {
            app: self.clone(),
            token,
        })
    }

    pub fn authenticate_no_cache(&self) -> Result<AutonomousSession> {
        self.authenticate(CachePolicy::BypassCache)
    }

    /// Authenticate (reusing a cached token) and rotate the secret
    pub fn update_api_secret(&self, new_secret: &str) -> Result<AutonomousApp> {
        self.authenticate(CachePolicy::CacheIfAvailable)?
            .update_api_secret(new_secret)
    }
}

/// An authenticated autonomous app
#[derive(Debug, Clone)]
pub struct AutonomousSession {
    app: AutonomousApp,
    token: Arc<AuthToken>,
}

impl AutonomousSession {
    pub fn app(&self) -> &AutonomousApp {
        &self.app
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    pub fn state(&self) -> SessionState {
        SessionState::Authenticated
    }

    /// Send a signed request. `request` is relative to the autonomous root;
    /// `None` means the service answered without content.
    pub fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Option<T>> {
        self.app.negotiator.execute(&self.token, None, request)
    }

    pub fn execute_no_content(&self, request: ApiRequest) -> Result<()> {
        self.app
            .negotiator
            .dispatch_signed(&self.token, None, request)
            .map(|_| ())
    }

    /// Rotate the secret. The token is evicted; the returned app signs with
    /// `new_secret` and must authenticate again.
    pub fn update_api_secret(self, new_secret: &str) -> Result<AutonomousApp> {
        let negotiator = self
            .app
            .negotiator
            .update_secret(&self.token, None, new_secret)?;
        Ok(AutonomousApp { negotiator })
    }

    /// Forget the token, locally and in the cache
    pub fn sign_out(self) -> AutonomousApp {
        self.app.negotiator.sign_out(&self.token);
        self.app
    }
}
