//! Per-claim insertion strategy
//!
//! Each method adds exactly one claim. The provided implementations insert
//! the value unchanged; a test double overrides only the claim it wants to
//! drop, null out or corrupt.

use serde_json::Value;

use super::ClaimSet;
use crate::protocol::ClaimNames;

pub trait PayloadClaimsManager: Send + Sync {
    fn add_nonce_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, nonce: String) {
        claims.insert(names.nonce.clone(), nonce);
    }

    fn add_epoch_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, epoch: i64) {
        claims.insert(names.epoch.clone(), epoch);
    }

    fn add_token_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, token: &str) {
        claims.insert(names.token.clone(), token);
    }

    fn add_username_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, username: &str) {
        claims.insert(names.username.clone(), username);
    }

    fn add_device_id_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, device_id: &str) {
        claims.insert(names.device_id.clone(), device_id);
    }

    fn add_doc_type_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, doc_type: &str) {
        claims.insert(names.doc_type.clone(), doc_type);
    }

    fn add_doc_number_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, doc_number: &str) {
        claims.insert(names.doc_number.clone(), doc_number);
    }

    fn add_password_claim(&self, claims: &mut ClaimSet, names: &ClaimNames, password: &str) {
        claims.insert(names.password.clone(), Value::from(password));
    }
}

/// Inserts every claim as produced
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPayloadClaimsManager;

impl PayloadClaimsManager for DefaultPayloadClaimsManager {}
