//! Process-wide token and device caches
//!
//! Both caches default to a single shared instance per process. Tests and
//! embedders that need isolation inject their own through
//! [`Providers`](crate::config::Providers).

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::identity::DeviceInfo;
use crate::token::AuthToken;

static SHARED_TOKEN_CACHE: Lazy<Arc<TokenCache>> = Lazy::new(|| Arc::new(TokenCache::new()));
static SHARED_DEVICE_CACHE: Lazy<Arc<DeviceInfoCache>> =
    Lazy::new(|| Arc::new(DeviceInfoCache::new()));

/// One live token per api key.
///
/// Entries are swapped whole, so a reader sees either the previous token or
/// the new one. Operations on one api key do not block readers of another.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: DashMap<String, Arc<AuthToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED_TOKEN_CACHE)
    }

    pub fn get(&self, api_key: &str) -> Option<Arc<AuthToken>> {
        self.entries.get(api_key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store a token under its own api key, returning the one it replaced
    pub fn set(&self, token: impl Into<Arc<AuthToken>>) -> Option<Arc<AuthToken>> {
        let token = token.into();
        let api_key = token.api_key().to_string();
        debug!(api_key = %api_key, scope = %token.scope(), "Caching token");
        self.entries.insert(api_key, token)
    }

    pub fn remove(&self, api_key: &str) -> Option<Arc<AuthToken>> {
        self.entries.remove(api_key).map(|(_, token)| token)
    }

    /// Remove the entry only if it still holds `token`, so a concurrent
    /// re-authentication is not undone
    pub fn evict(&self, token: &AuthToken) -> bool {
        self.entries
            .remove_if(token.api_key(), |_, current| current.token() == token.token())
            .is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Device fingerprint reused across sign-ins
#[derive(Debug, Default)]
pub struct DeviceInfoCache {
    slot: RwLock<Option<DeviceInfo>>,
}

impl DeviceInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED_DEVICE_CACHE)
    }

    /// Explicit value first (stored, replacing any cached one), then the
    /// cached value, then a freshly generated one. A generated value is
    /// stored only if no other caller stored one first.
    pub fn resolve(&self, explicit: Option<&DeviceInfo>) -> DeviceInfo {
        if let Some(explicit) = explicit {
            *self.slot.write() = Some(explicit.clone());
            return explicit.clone();
        }

        if let Some(cached) = self.slot.read().as_ref() {
            return cached.clone();
        }

        self.slot.write().get_or_insert_with(DeviceInfo::generate).clone()
    }

    pub fn get(&self) -> Option<DeviceInfo> {
        self.slot.read().clone()
    }

    pub fn clear(&self) {
        *self.slot.write() = None;
    }
}
