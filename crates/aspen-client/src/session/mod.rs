//! Session negotiation
//!
//! An app value is unauthenticated; `authenticate` turns it into a session
//! holding a token, and rotating the secret or signing out turns the session
//! back into an app. Both app kinds drive the same [`Negotiator`], which only
//! differs in scope root and in the claim shape the header composer builds.
//!
//! ```text
//! Unauthenticated --authenticate--> Authenticated --execute--> Authenticated
//!        ^                                |
//!        +---- update_api_secret ---------+
//!        +---- sign_out ------------------+
//! ```

pub mod autonomous;
pub mod builder;
pub mod delegated;

pub use autonomous::{AutonomousApp, AutonomousSession};
pub use builder::{AppKind, IdentityStage, ReadyStage, RoutingStage};
pub use delegated::{DelegatedApp, DelegatedSession};

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::cache::TokenCache;
use crate::error::{ApiError, Error, Result};
use crate::headers::HeaderComposer;
use crate::identity::{AppIdentity, Scope, UserIdentity};
use crate::jwt::JwtSigner;
use crate::protocol::{ClaimNames, Routes};
use crate::secret_policy::SecretPolicy;
use crate::token::AuthToken;
use crate::transport::{ApiRequest, ApiResponse, Endpoint, Transport};

/// Whether `authenticate` may answer from the token cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Reuse a cached, unexpired token for the same api key and scope
    #[default]
    CacheIfAvailable,
    /// Always perform the sign-in round trip, overwriting the cache
    BypassCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Signing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Signing => "signing",
        };
        f.write_str(label)
    }
}

#[derive(Serialize)]
struct UpdateSecretBody<'a> {
    #[serde(rename = "NewValue")]
    new_value: &'a str,
}

/// Signing engine shared by autonomous and delegated apps.
///
/// Opaque outside this crate; obtained through the staged builder.
#[derive(Clone)]
pub struct Negotiator {
    scope: Scope,
    identity: AppIdentity,
    endpoint: Endpoint,
    api_version: Option<String>,
    routes: Routes,
    claim_names: ClaimNames,
    secret_policy: SecretPolicy,
    signer: JwtSigner,
    composer: Arc<dyn HeaderComposer>,
    transport: Arc<dyn Transport>,
    token_cache: Arc<TokenCache>,
}

impl Negotiator {
    pub(crate) fn scope(&self) -> Scope {
        self.scope
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.identity.api_key
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn root(&self) -> &str {
        match self.scope {
            Scope::Autonomous => &self.routes.autonomous_root,
            Scope::Delegated => &self.routes.delegated_root,
        }
    }

    fn transition(&self, from: SessionState, to: SessionState) {
        trace!(api_key = %self.identity.api_key, %from, %to, "Session state");
    }

    /// A cached token usable by this app (and user), evicting one that is
    /// expired or was issued for another scope or user
    fn cached_token(&self, username: Option<&str>) -> Option<Arc<AuthToken>> {
        let cached = self.token_cache.get(&self.identity.api_key)?;
        let usable = !cached.is_expired()
            && cached.scope() == self.scope
            && (username.is_none() || cached.username() == username);

        if usable {
            debug!(api_key = %self.identity.api_key, "Using cached token");
            Some(cached)
        } else {
            debug!(api_key = %self.identity.api_key, "Discarding unusable cached token");
            self.token_cache.evict(&cached);
            None
        }
    }

    pub(crate) fn signin(
        &self,
        user: Option<&UserIdentity>,
        policy: CachePolicy,
    ) -> Result<Arc<AuthToken>> {
        let username = user.map(UserIdentity::username);
        if policy == CachePolicy::CacheIfAvailable {
            if let Some(token) = self.cached_token(username.as_deref()) {
                return Ok(token);
            }
        }

        self.transition(SessionState::Unauthenticated, SessionState::Authenticating);
        let mut request = ApiRequest::post(self.routes.signin.clone()).under_root(self.root());
        self.composer.add_api_key_header(&mut request, &self.identity.api_key)?;
        self.composer
            .add_api_version_header(&mut request, self.api_version.as_deref())?;
        self.composer
            .add_signin_payload_header(&mut request, &self.identity.api_secret, user)?;

        let response = self.send(&request)?;
        let mut token = AuthToken::from_signin_response(
            &response.body,
            &self.identity.api_key,
            &self.identity.api_secret,
            self.scope,
            &self.signer,
            &self.claim_names,
        )?;
        if let Some(username) = username {
            if token.username().is_none() {
                let device_id = token.device_id().map(str::to_string);
                token = token.with_user(username, device_id);
            }
        }

        let token = Arc::new(token);
        self.token_cache.set(Arc::clone(&token));
        info!(api_key = %self.identity.api_key, scope = %self.scope, "Signed in");
        self.transition(SessionState::Authenticating, SessionState::Authenticated);
        Ok(token)
    }

    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        debug!("Resource => {}{}", self.endpoint.base_url(), request.resource());
        debug!("Method => {}", request.method());

        let response = self.transport.send(request)?;
        if !response.is_success() {
            let err = ApiError::from_response(response.status, &response.body);
            warn!(
                event_id = err.event_id().unwrap_or("n/a"),
                status = err.status_code,
                category = %err.category(),
                "Request rejected"
            );
            return Err(err.into());
        }
        Ok(response)
    }

    /// Attach the signed headers and dispatch. A rejection leaves the cache
    /// untouched; callers decide whether to re-authenticate.
    pub(crate) fn dispatch_signed(
        &self,
        token: &AuthToken,
        username: Option<&str>,
        request: ApiRequest,
    ) -> Result<ApiResponse> {
        self.transition(SessionState::Authenticated, SessionState::Signing);
        let mut request = request.under_root(self.root());
        self.composer.add_api_key_header(&mut request, &self.identity.api_key)?;
        self.composer
            .add_api_version_header(&mut request, self.api_version.as_deref())?;
        self.composer.add_signed_payload_header(
            &mut request,
            &self.identity.api_secret,
            token.token(),
            username,
        )?;

        let response = self.send(&request);
        self.transition(SessionState::Signing, SessionState::Authenticated);
        response
    }

    pub(crate) fn execute<T: DeserializeOwned>(
        &self,
        token: &AuthToken,
        username: Option<&str>,
        request: ApiRequest,
    ) -> Result<Option<T>> {
        let response = self.dispatch_signed(token, username, request)?;
        if response.has_no_content() {
            return Ok(None);
        }

        serde_json::from_str(&response.body)
            .map(Some)
            .map_err(|e| Error::InvalidResponse(format!("Unexpected response body: {}", e)))
    }

    /// Rotate the secret, signing with the current one. On success the
    /// token is evicted and an engine holding the new secret is returned.
    pub(crate) fn update_secret(
        &self,
        token: &AuthToken,
        username: Option<&str>,
        new_secret: &str,
    ) -> Result<Negotiator> {
        self.secret_policy
            .validate(new_secret, &self.identity.api_secret)?;

        let request = ApiRequest::post(self.routes.update_secret.clone())
            .with_json_body(&UpdateSecretBody { new_value: new_secret })?;
        self.dispatch_signed(token, username, request)?;

        self.token_cache.evict(token);
        info!(api_key = %self.identity.api_key, "Api secret updated");
        self.transition(SessionState::Authenticated, SessionState::Unauthenticated);

        Ok(Self {
            identity: self.identity.with_secret(new_secret),
            ..self.clone()
        })
    }

    pub(crate) fn sign_out(&self, token: &AuthToken) {
        self.token_cache.evict(token);
        self.transition(SessionState::Authenticated, SessionState::Unauthenticated);
    }
}

impl fmt::Debug for Negotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiator")
            .field("scope", &self.scope)
            .field("identity", &self.identity)
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}
