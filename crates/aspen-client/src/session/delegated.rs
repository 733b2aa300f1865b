//! Applications acting on behalf of an end user

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::builder::{AppKind, RoutingStage};
use super::{CachePolicy, Negotiator, SessionState};
use crate::error::Result;
use crate::identity::{Scope, UserIdentity};
use crate::token::AuthToken;
use crate::transport::{ApiRequest, Endpoint};

/// A delegated app that has not authenticated a user yet
#[derive(Debug, Clone)]
pub struct DelegatedApp {
    negotiator: Negotiator,
}

impl AppKind for DelegatedApp {
    const SCOPE: Scope = Scope::Delegated;

    fn from_negotiator(negotiator: Negotiator) -> Self {
        Self { negotiator }
    }
}

impl DelegatedApp {
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

    /// Sign `user` in. A cached token is reused only if it was issued to the
    /// same user.
    pub fn authenticate(&self, user: &UserIdentity, policy: CachePolicy) -> Result<DelegatedSession> {
        user.validate()?;
        let token = self.negotiator.signin(Some(user), policy)?;
        Ok(DelegatedSession {
            app: self.clone(),
            username: user.username(),
            token,
        })
    }

    pub fn authenticate_no_cache(&self, user: &UserIdentity) -> Result<DelegatedSession> {
        self.authenticate(user, CachePolicy::BypassCache)
    }

    /// Authenticate `user` (reusing a cached token) and rotate the secret
    pub fn update_api_secret(&self, user: &UserIdentity, new_secret: &str) -> Result<DelegatedApp> {
        self.authenticate(user, CachePolicy::CacheIfAvailable)?
            .update_api_secret(new_secret)
    }
}

/// An authenticated delegated app, bound to one user
#[derive(Debug, Clone)]
pub struct DelegatedSession {
    app: DelegatedApp,
    username: String,
    token: Arc<AuthToken>,
}

impl DelegatedSession {
    pub fn app(&self) -> &DelegatedApp {
        &self.app
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> SessionState {
        SessionState::Authenticated
    }

    /// Send a user-signed request relative to the delegated root
    pub fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Option<T>> {
        self.app
            .negotiator
            .execute(&self.token, Some(&self.username), request)
    }

    pub fn execute_no_content(&self, request: ApiRequest) -> Result<()> {
        self.app
            .negotiator
            .dispatch_signed(&self.token, Some(&self.username), request)
            .map(|_| ())
    }

    pub fn update_api_secret(self, new_secret: &str) -> Result<DelegatedApp> {
        let negotiator = self.app.negotiator.update_secret(
            &self.token,
            Some(&self.username),
            new_secret,
        )?;
        Ok(DelegatedApp { negotiator })
    }

    pub fn sign_out(self) -> DelegatedApp {
        self.app.negotiator.sign_out(&self.token);
        self.app
    }
}
