//! # Aspen-Client
//!
//! Replay-protected request signing and session negotiation for clients of
//! the Aspen API.
//!
//! This crate provides:
//! - Autonomous apps (acting on their own behalf) and delegated apps
//!   (acting for an end user), built through a staged builder
//! - Anti-replay claims (nonce, epoch) in an HMAC-signed payload header on
//!   every request
//! - A process-wide token cache with explicit bypass
//! - Client-side secret policy and secret rotation
//! - One typed error carrying the verifier's event id and status
//!
//! ## Architecture
//!
//! Claim generators feed the payload builder, the JWT signer turns claim
//! sets into the payload header, and the header composer attaches the api
//! key, payload and version headers. Sessions drive the composer and hand
//! the request to a [`Transport`]. Every collaborator is injected through
//! [`Providers`], so tests substitute a misbehaving generator or an
//! in-process verifier without touching the rest.

pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod headers;
pub mod identity;
pub mod jwt;
pub mod logging;
pub mod protocol;
pub mod secret_policy;
pub mod session;
pub mod token;
pub mod transport;

pub use cache::{DeviceInfoCache, TokenCache};
pub use claims::{
    ClaimSet, EpochGenerator, FixedEpochGenerator, NonceGenerator, PayloadBuilder,
    PayloadClaimsManager,
};
pub use config::{ClientConfig, Providers};
pub use error::{ApiError, Error, ErrorCategory, IdentityFailure, Result};
pub use headers::{ApiVersion, DefaultHeaderComposer, HeaderComposer};
pub use identity::{AppIdentity, DeviceInfo, EnvironmentIdentity, IdentityProvider, Scope, UserIdentity};
pub use jwt::{JwtError, JwtSigner};
pub use logging::{setup_logging, LoggingConfig};
pub use protocol::{event_ids, ClaimNames, HeaderNames, Routes};
pub use secret_policy::{SecretPolicy, SecretPolicyError};
pub use session::{
    AutonomousApp, AutonomousSession, CachePolicy, DelegatedApp, DelegatedSession, SessionState,
};
pub use token::AuthToken;
pub use transport::{ApiRequest, ApiResponse, Endpoint, ReqwestTransport, Transport};
