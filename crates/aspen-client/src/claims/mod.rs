//! Claim sets embedded in the signed payload header
//!
//! Building a payload is split in three layers:
//!
//! - [`generators`] produce the anti-replay values (nonce, epoch)
//! - [`PayloadClaimsManager`] decides how each individual claim lands in the
//!   set, one method per claim kind
//! - [`PayloadBuilder`] knows which claims each request kind requires
//!
//! Substituting a single claim strategy (drop it, null it, corrupt it) never
//! requires touching the rest of the payload construction path.

pub mod builder;
pub mod generators;
pub mod manager;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use builder::{ClaimShape, PayloadBuilder};
pub use generators::{
    EpochGenerator, FixedEpochGenerator, NonceGenerator, UnixEpochGenerator, UuidNonceGenerator,
};
pub use manager::{DefaultPayloadClaimsManager, PayloadClaimsManager};

/// Insertion-ordered claim name to value mapping, built fresh per request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Insert or replace a claim; a claim name appears at most once
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
