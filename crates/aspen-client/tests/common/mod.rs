//! Shared harness: an in-process verifier standing in for the remote
//! service, plus misbehaving collaborators used to exercise it.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aspen_client::claims::ClaimSet;
use aspen_client::{
    event_ids, ApiRequest, ApiResponse, ApiVersion, AppIdentity, AutonomousApp, ClaimNames,
    DefaultHeaderComposer, DelegatedApp, DeviceInfoCache, Endpoint, HeaderComposer, HeaderNames,
    JwtError, JwtSigner, LoggingConfig, NonceGenerator, PayloadBuilder, PayloadClaimsManager,
    Providers, Result, Routes, Scope, SecretPolicy, Transport, UserIdentity,
};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{json, Value};
use tracing::Level;

pub const BASE_URL: &str = "https://aspen.test/api";

pub const AUTONOMOUS_KEY: &str = "autonomous-key";
pub const AUTONOMOUS_SECRET: &str = "autonomous-secret";
pub const OTHER_AUTONOMOUS_KEY: &str = "other-autonomous-key";
pub const OTHER_AUTONOMOUS_SECRET: &str = "other-autonomous-secret";
pub const DELEGATED_KEY: &str = "delegated-key";
pub const DELEGATED_SECRET: &str = "delegated-secret";

pub const USER_DOC_TYPE: &str = "CC";
pub const USER_DOC_NUMBER: &str = "52080323";
pub const USER_PASSWORD: &str = "colombia";

/// Admissible epoch drift, either direction
pub const EPOCH_WINDOW_DAYS: i64 = 3;

static NONCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

pub fn init_logging() {
    let _ = aspen_client::setup_logging(&LoggingConfig::new(Level::DEBUG, "aspen-client-tests"));
}

pub fn endpoint() -> Endpoint {
    Endpoint::new(BASE_URL, None).unwrap()
}

pub fn user() -> UserIdentity {
    UserIdentity::new(USER_DOC_TYPE, USER_DOC_NUMBER, USER_PASSWORD)
}

/// Isolated caches routed to `verifier`
pub fn providers(verifier: &Arc<Verifier>) -> Providers {
    Providers::isolated().with_transport(verifier.clone())
}

pub fn autonomous_app(verifier: &Arc<Verifier>, key: &str, secret: &str) -> AutonomousApp {
    autonomous_app_with(providers(verifier), key, secret)
}

pub fn autonomous_app_with(providers: Providers, key: &str, secret: &str) -> AutonomousApp {
    AutonomousApp::builder()
        .routing_to(endpoint())
        .with_identity(AppIdentity::new(key, secret))
        .with_providers(providers)
        .build()
        .unwrap()
}

pub fn delegated_app(verifier: &Arc<Verifier>) -> DelegatedApp {
    delegated_app_with(providers(verifier))
}

pub fn delegated_app_with(providers: Providers) -> DelegatedApp {
    DelegatedApp::builder()
        .routing_to(endpoint())
        .with_identity(AppIdentity::new(DELEGATED_KEY, DELEGATED_SECRET))
        .with_providers(providers)
        .build()
        .unwrap()
}

/// The event id carried by a failed operation
pub fn event_id_of<T: std::fmt::Debug>(result: Result<T>) -> (String, u16) {
    let err = result.unwrap_err();
    let api = err
        .as_api_error()
        .unwrap_or_else(|| panic!("expected a protocol error, got {:?}", err));
    (api.event_id().unwrap_or_default().to_string(), api.status_code)
}

#[derive(Debug, Clone)]
struct AppRecord {
    secret: String,
    scope: Scope,
    enabled: bool,
    rotation_required: bool,
}

#[derive(Debug, Clone)]
struct UserRecord {
    password: String,
    locked: bool,
}

#[derive(Debug, Clone)]
struct IssuedToken {
    api_key: String,
    expires_at: DateTime<Utc>,
    username: Option<String>,
}

struct Rejection {
    status: u16,
    event_id: &'static str,
    message: String,
}

fn reject(status: u16, event_id: &'static str, message: impl Into<String>) -> Rejection {
    Rejection {
        status,
        event_id,
        message: message.into(),
    }
}

type Outcome = std::result::Result<ApiResponse, Rejection>;

/// In-process stand-in for the remote verifier.
///
/// Enforces header presence, signature, scope, app status, nonce
/// uniqueness per api key, the epoch window, token ownership and expiry, and
/// the secret policy. Counts every round trip.
pub struct Verifier {
    headers: HeaderNames,
    claims: ClaimNames,
    routes: Routes,
    signer: JwtSigner,
    policy: SecretPolicy,
    token_lifetime: Duration,
    apps: Mutex<HashMap<String, AppRecord>>,
    users: Mutex<HashMap<String, UserRecord>>,
    nonces: Mutex<HashMap<String, HashSet<String>>>,
    tokens: Mutex<HashMap<String, IssuedToken>>,
    requests: Mutex<Vec<ApiRequest>>,
    round_trips: AtomicUsize,
}

impl Verifier {
    /// Two autonomous apps, one delegated app and one user
    pub fn new() -> Arc<Self> {
        let verifier = Self {
            headers: HeaderNames::default(),
            claims: ClaimNames::default(),
            routes: Routes::default(),
            signer: JwtSigner::default(),
            policy: SecretPolicy::default(),
            token_lifetime: Duration::minutes(30),
            apps: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            nonces: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            round_trips: AtomicUsize::new(0),
        };
        verifier.register_app(AUTONOMOUS_KEY, AUTONOMOUS_SECRET, Scope::Autonomous);
        verifier.register_app(OTHER_AUTONOMOUS_KEY, OTHER_AUTONOMOUS_SECRET, Scope::Autonomous);
        verifier.register_app(DELEGATED_KEY, DELEGATED_SECRET, Scope::Delegated);
        verifier.register_user(USER_DOC_TYPE, USER_DOC_NUMBER, USER_PASSWORD);
        Arc::new(verifier)
    }

    pub fn register_app(&self, api_key: &str, secret: &str, scope: Scope) {
        self.apps.lock().insert(
            api_key.to_string(),
            AppRecord {
                secret: secret.to_string(),
                scope,
                enabled: true,
                rotation_required: false,
            },
        );
    }

    pub fn register_user(&self, doc_type: &str, doc_number: &str, password: &str) {
        self.users.lock().insert(
            format!("{}-{}", doc_type, doc_number),
            UserRecord {
                password: password.to_string(),
                locked: false,
            },
        );
    }

    pub fn lock_user(&self, doc_type: &str, doc_number: &str) {
        if let Some(user) = self.users.lock().get_mut(&format!("{}-{}", doc_type, doc_number)) {
            user.locked = true;
        }
    }

    pub fn disable_app(&self, api_key: &str) {
        if let Some(app) = self.apps.lock().get_mut(api_key) {
            app.enabled = false;
        }
    }

    pub fn require_rotation(&self, api_key: &str) {
        if let Some(app) = self.apps.lock().get_mut(api_key) {
            app.rotation_required = true;
        }
    }

    pub fn secret_of(&self, api_key: &str) -> Option<String> {
        self.apps.lock().get(api_key).map(|app| app.secret.clone())
    }

    /// Push every token issued to `api_key` past its expiry
    pub fn expire_tokens(&self, api_key: &str) {
        for issued in self.tokens.lock().values_mut() {
            if issued.api_key == api_key {
                issued.expires_at = Utc::now() - Duration::seconds(1);
            }
        }
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().last().cloned()
    }

    fn handle(&self, request: &ApiRequest) -> Outcome {
        let resource = request.resource().to_string();
        let delegated_route = resource.starts_with(&format!(
            "/{}/",
            self.routes.delegated_root.trim_matches('/')
        ));

        let api_key = non_blank_header(request, &self.headers.api_key).ok_or_else(|| {
            let event_id = if delegated_route {
                event_ids::API_KEY_HEADER_MISSING
            } else {
                event_ids::REQUIRED_HEADER_MISSING
            };
            reject(400, event_id, format!("Custom header '{}' is required", self.headers.api_key))
        })?;
        let payload = non_blank_header(request, &self.headers.payload).ok_or_else(|| {
            let event_id = if delegated_route {
                event_ids::PAYLOAD_HEADER_MISSING
            } else {
                event_ids::REQUIRED_HEADER_MISSING
            };
            reject(400, event_id, format!("Custom header '{}' is required", self.headers.payload))
        })?;

        self.check_api_version(request)?;

        let app = self.apps.lock().get(&api_key).cloned().ok_or_else(|| {
            reject(400, event_ids::API_KEY_UNRECOGNIZED, "Identity not recognized")
        })?;
        let route_scope = if delegated_route {
            Scope::Delegated
        } else {
            Scope::Autonomous
        };
        if app.scope != route_scope {
            return Err(reject(
                403,
                event_ids::SCOPE_MISMATCH,
                "The api key is not valid for this scope",
            ));
        }
        if !app.enabled {
            return Err(reject(409, event_ids::API_KEY_DISABLED, "The application is disabled"));
        }
        if app.rotation_required && !resource.ends_with(&self.routes.update_secret) {
            return Err(reject(
                417,
                event_ids::SECRET_ROTATION_REQUIRED,
                "The application must update its secret",
            ));
        }

        let claims = self.signer.decode(&payload, &app.secret).map_err(|e| {
            let reason = match e {
                JwtError::SignatureMismatch => "signature does not match",
                _ => "malformed token",
            };
            reject(
                400,
                event_ids::PAYLOAD_INVALID,
                format!("Content of custom header '{}' is not valid: {}", self.headers.payload, reason),
            )
        })?;

        self.check_epoch(&claims)?;
        self.check_nonce(&api_key, &claims)?;

        let root = if delegated_route {
            &self.routes.delegated_root
        } else {
            &self.routes.autonomous_root
        };
        if resource == Routes::join(root, &self.routes.signin) {
            return if delegated_route {
                self.delegated_signin(request, &api_key, &app, &claims)
            } else {
                self.issue_token(&api_key, &app, None, None)
            };
        }

        let username = self.check_token(&api_key, &claims, delegated_route)?;

        if resource == Routes::join(root, &self.routes.update_secret) {
            return self.update_secret(request, &api_key, &app);
        }

        if resource.ends_with("/empty") {
            return Ok(ApiResponse::new(204, ""));
        }

        let body = json!({
            "resource": resource,
            "apiKey": api_key,
            "username": username,
        });
        Ok(ApiResponse::new(200, body.to_string()))
    }

    fn check_api_version(&self, request: &ApiRequest) -> std::result::Result<(), Rejection> {
        let Some(raw) = request.header(&self.headers.api_version) else {
            return Ok(());
        };
        let invalid = || {
            reject(
                400,
                event_ids::API_VERSION_INVALID,
                format!("'{}' is not a valid format for header '{}'", raw, self.headers.api_version),
            )
        };
        if raw.trim().is_empty() {
            return Err(invalid());
        }
        let version = ApiVersion::from_str(raw).map_err(|_| invalid())?;
        if version.major != 1 {
            return Err(reject(
                400,
                event_ids::API_VERSION_UNSUPPORTED,
                format!("'{}' is not a supported value for header '{}'", raw, self.headers.api_version),
            ));
        }
        Ok(())
    }

    fn check_nonce(&self, api_key: &str, claims: &ClaimSet) -> std::result::Result<(), Rejection> {
        let name = &self.claims.nonce;
        let nonce = required_claim(claims, name)?;
        if !NONCE_PATTERN.is_match(&nonce) {
            return Err(reject(
                400,
                event_ids::CLAIM_INVALID,
                format!("'{}' must match the expected pattern", name),
            ));
        }

        let mut nonces = self.nonces.lock();
        if !nonces.entry(api_key.to_string()).or_default().insert(nonce) {
            return Err(reject(
                400,
                event_ids::CLAIM_INVALID,
                "Nonce already processed for your application",
            ));
        }
        Ok(())
    }

    fn check_epoch(&self, claims: &ClaimSet) -> std::result::Result<(), Rejection> {
        let name = &self.claims.epoch;
        let raw = required_claim(claims, name)?;
        let seconds: i64 = raw
            .parse()
            .ok()
            .filter(|s: &i64| *s >= 0)
            .ok_or_else(|| {
                reject(400, event_ids::EPOCH_FORMAT_INVALID, "Epoch format is not valid. It must be a number")
            })?;

        let drift = (Utc::now().timestamp() - seconds).abs();
        if seconds == 0 || drift > Duration::days(EPOCH_WINDOW_DAYS).num_seconds() {
            return Err(reject(416, event_ids::EPOCH_OUT_OF_RANGE, "Epoch is out of the admitted range"));
        }
        Ok(())
    }

    /// The username bound to the token, for delegated routes
    fn check_token(
        &self,
        api_key: &str,
        claims: &ClaimSet,
        delegated: bool,
    ) -> std::result::Result<Option<String>, Rejection> {
        let token = required_claim(claims, &self.claims.token)?;
        let issued = self
            .tokens
            .lock()
            .get(&token)
            .cloned()
            .ok_or_else(|| reject(401, event_ids::TOKEN_NOT_FOUND, "No valid token found for the application"))?;

        if issued.api_key != api_key {
            return Err(reject(401, event_ids::TOKEN_MISMATCH, "Token does not match the application"));
        }
        if issued.expires_at <= Utc::now() {
            return Err(reject(401, event_ids::TOKEN_EXPIRED, "The provided token has expired"));
        }

        if !delegated {
            return Ok(None);
        }
        let username = required_claim(claims, &self.claims.username)?;
        required_claim(claims, &self.claims.device_id)?;
        if issued.username.as_deref() != Some(username.as_str()) {
            return Err(reject(401, event_ids::TOKEN_MISMATCH, "Token does not match the user"));
        }
        Ok(Some(username))
    }

    fn delegated_signin(
        &self,
        request: &ApiRequest,
        api_key: &str,
        app: &AppRecord,
        claims: &ClaimSet,
    ) -> Outcome {
        let doc_type = required_claim(claims, &self.claims.doc_type)?;
        let doc_number = required_claim(claims, &self.claims.doc_number)?;
        let password = required_claim(claims, &self.claims.password)?;
        let device_id = required_claim(claims, &self.claims.device_id)?;

        if non_blank_header(request, &self.headers.device_info).is_none() {
            return Err(reject(
                400,
                event_ids::REQUIRED_HEADER_MISSING,
                format!("Custom header '{}' is required", self.headers.device_info),
            ));
        }

        let username = format!("{}-{}", doc_type, doc_number);
        let user = self.users.lock().get(&username).cloned().ok_or_else(|| {
            reject(401, event_ids::USER_UNRECOGNIZED, "User not recognized")
        })?;
        if user.locked {
            return Err(reject(401, event_ids::USER_LOCKED, "User is locked"));
        }
        if user.password != password {
            return Err(reject(401, event_ids::USER_INVALID_CREDENTIALS, "Invalid credentials"));
        }

        self.issue_token(api_key, app, Some(username), Some(device_id))
    }

    fn issue_token(
        &self,
        api_key: &str,
        app: &AppRecord,
        username: Option<String>,
        device_id: Option<String>,
    ) -> Outcome {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + self.token_lifetime;

        let mut claims = ClaimSet::new();
        claims.insert(self.claims.token.clone(), token.clone());
        claims.insert("ExpiresAt", expires_at.to_rfc3339());
        if let Some(username) = &username {
            claims.insert(self.claims.username.clone(), username.clone());
        }
        if let Some(device_id) = device_id {
            claims.insert(self.claims.device_id.clone(), device_id);
        }

        self.tokens.lock().insert(
            token,
            IssuedToken {
                api_key: api_key.to_string(),
                expires_at,
                username,
            },
        );

        let compact = self
            .signer
            .encode(&claims, &app.secret)
            .map_err(|e| reject(500, "0", e.to_string()))?;
        Ok(ApiResponse::new(200, Value::String(compact).to_string()))
    }

    fn update_secret(&self, request: &ApiRequest, api_key: &str, app: &AppRecord) -> Outcome {
        let new_secret = request
            .body()
            .and_then(|body| body.get("NewValue"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        self.policy.validate(&new_secret, &app.secret).map_err(|e| {
            let status = 406;
            reject(status, e.event_id(), e.to_string())
        })?;

        if let Some(record) = self.apps.lock().get_mut(api_key) {
            record.secret = new_secret;
            record.rotation_required = false;
        }
        self.tokens.lock().retain(|_, issued| issued.api_key != api_key);
        Ok(ApiResponse::new(204, ""))
    }
}

impl Transport for Verifier {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        Ok(match self.handle(request) {
            Ok(response) => response,
            Err(rejection) => ApiResponse::new(
                rejection.status,
                json!({
                    "eventId": rejection.event_id,
                    "statusCode": rejection.status,
                    "message": rejection.message,
                })
                .to_string(),
            ),
        })
    }
}

fn non_blank_header(request: &ApiRequest, name: &str) -> Option<String> {
    request
        .header(name)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// String or integer claim, present and not blank
fn required_claim(claims: &ClaimSet, name: &str) -> std::result::Result<String, Rejection> {
    let missing = || {
        reject(
            400,
            event_ids::CLAIM_INVALID,
            format!("'{}' must not be null or empty", name),
        )
    };
    match claims.get(name) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.clone()),
        Some(Value::Number(value)) => Ok(value.to_string()),
        _ => Err(missing()),
    }
}

/// Always hands out the same nonce
pub struct RepeatedNonce(pub String);

impl RepeatedNonce {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().hyphenated().to_string())
    }
}

impl NonceGenerator for RepeatedNonce {
    fn next_nonce(&self) -> String {
        self.0.clone()
    }
}

/// What to do with one targeted claim
#[derive(Debug, Clone)]
pub enum Tamper {
    Omit,
    Replace(Value),
}

/// Claims manager that tampers with exactly one claim and passes the rest
/// through unchanged
pub struct TamperingClaimsManager {
    target: String,
    action: Tamper,
}

impl TamperingClaimsManager {
    pub fn omit(target: &str) -> Self {
        Self {
            target: target.to_string(),
            action: Tamper::Omit,
        }
    }

    pub fn replace(target: &str, value: impl Into<Value>) -> Self {
        Self {
            target: target.to_string(),
            action: Tamper::Replace(value.into()),
        }
    }

    fn apply(&self, claims: &mut ClaimSet, name: &str, value: Value) {
        if name != self.target {
            claims.insert(name.to_string(), value);
            return;
        }
        match &self.action {
            Tamper::Omit => {}
            Tamper::Replace(replacement) => claims.insert(name.to_string(), replacement.clone()),
        }
    }
}

impl PayloadClaimsManager for TamperingClaimsManager {
    fn add_nonce_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, nonce: String) {
        self.apply(claims, &names.nonce, Value::from(nonce));
    }

    fn add_epoch_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, epoch: i64) {
        self.apply(claims, &names.epoch, Value::from(epoch));
    }

    fn add_token_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, token: &str) {
        self.apply(claims, &names.token, Value::from(token));
    }

    fn add_username_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, username: &str) {
        self.apply(claims, &names.username, Value::from(username));
    }

    fn add_device_id_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, device_id: &str) {
        self.apply(claims, &names.device_id, Value::from(device_id));
    }

    fn add_doc_type_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, doc_type: &str) {
        self.apply(claims, &names.doc_type, Value::from(doc_type));
    }

    fn add_doc_number_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, doc_number: &str) {
        self.apply(claims, &names.doc_number, Value::from(doc_number));
    }

    fn add_password_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, password: &str) {
        self.apply(claims, &names.password, Value::from(password));
    }
}

/// Which header a [`TamperingHeaderComposer`] corrupts
#[derive(Debug, Clone)]
pub enum HeaderTamper {
    ApiKey(Option<String>),
    Payload(Option<String>),
    ApiVersion(Option<String>),
}

/// Default composition, except one header is dropped (`None`) or replaced
pub struct TamperingHeaderComposer {
    inner: DefaultHeaderComposer,
    names: HeaderNames,
    tamper: HeaderTamper,
}

impl TamperingHeaderComposer {
    pub fn new(tamper: HeaderTamper) -> Self {
        Self {
            inner: DefaultHeaderComposer::new(
                PayloadBuilder::default(),
                JwtSigner::default(),
                HeaderNames::default(),
                Arc::new(DeviceInfoCache::new()),
            ),
            names: HeaderNames::default(),
            tamper,
        }
    }

    fn overwrite(&self, request: &mut ApiRequest, name: &str, value: &Option<String>) -> Result<()> {
        match value {
            Some(value) => request.set_header(name, value),
            None => {
                request.remove_header(name);
                Ok(())
            }
        }
    }
}

impl HeaderComposer for TamperingHeaderComposer {
    fn add_api_key_header(&self, request: &mut ApiRequest, api_key: &str) -> Result<()> {
        match &self.tamper {
            HeaderTamper::ApiKey(value) => self.overwrite(request, &self.names.api_key, value),
            _ => self.inner.add_api_key_header(request, api_key),
        }
    }

    fn add_api_version_header(&self, request: &mut ApiRequest, version: Option<&str>) -> Result<()> {
        match &self.tamper {
            HeaderTamper::ApiVersion(value) => self.overwrite(request, &self.names.api_version, value),
            _ => self.inner.add_api_version_header(request, version),
        }
    }

    fn add_signin_payload_header(
        &self,
        request: &mut ApiRequest,
        api_secret: &str,
        user: Option<&UserIdentity>,
    ) -> Result<()> {
        self.inner.add_signin_payload_header(request, api_secret, user)?;
        match &self.tamper {
            HeaderTamper::Payload(value) => self.overwrite(request, &self.names.payload, value),
            _ => Ok(()),
        }
    }

    fn add_signed_payload_header(
        &self,
        request: &mut ApiRequest,
        api_secret: &str,
        token: &str,
        username: Option<&str>,
    ) -> Result<()> {
        self.inner
            .add_signed_payload_header(request, api_secret, token, username)?;
        match &self.tamper {
            HeaderTamper::Payload(value) => self.overwrite(request, &self.names.payload, value),
            _ => Ok(()),
        }
    }
}
