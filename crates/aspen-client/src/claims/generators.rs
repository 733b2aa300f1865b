//! Anti-replay claim generators

use chrono::{Duration, Utc};
use uuid::Uuid;

/// Produces a fresh single-use nonce per call
pub trait NonceGenerator: Send + Sync {
    fn next_nonce(&self) -> String;
}

/// Produces the request issuance time in seconds since the Unix epoch
pub trait EpochGenerator: Send + Sync {
    fn seconds(&self) -> i64;
}

/// Random UUID v4 nonces in hyphenated lowercase form
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidNonceGenerator;

impl NonceGenerator for UuidNonceGenerator {
    fn next_nonce(&self) -> String {
        Uuid::new_v4().hyphenated().to_string()
    }
}

/// Wall-clock epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixEpochGenerator;

impl EpochGenerator for UnixEpochGenerator {
    fn seconds(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Epoch pinned to a fixed instant, for deterministic tests and for
/// probing the verifier's drift window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedEpochGenerator {
    seconds: i64,
}

impl FixedEpochGenerator {
    pub fn new(seconds: i64) -> Self {
        Self { seconds }
    }

    /// Now shifted by whole days (negative values go into the past)
    pub fn from_days_offset(days: i64) -> Self {
        Self::new((Utc::now() + Duration::days(days)).timestamp())
    }
}

impl EpochGenerator for FixedEpochGenerator {
    fn seconds(&self) -> i64 {
        self.seconds
    }
}
