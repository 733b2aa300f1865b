//! Claim sets per request kind

use std::fmt;
use std::sync::Arc;

use super::generators::{EpochGenerator, NonceGenerator, UnixEpochGenerator, UuidNonceGenerator};
use super::manager::{DefaultPayloadClaimsManager, PayloadClaimsManager};
use super::ClaimSet;
use crate::identity::UserIdentity;
use crate::protocol::ClaimNames;

/// Which claims a request carries
#[derive(Debug, Clone, Copy)]
pub enum ClaimShape<'a> {
    /// `{nonce, epoch}`
    AutonomousSignin,
    /// `{nonce, epoch, docType, docNumber, password, deviceId}`
    DelegatedSignin {
        user: &'a UserIdentity,
        device_id: &'a str,
    },
    /// `{nonce, epoch, token}`
    AutonomousSigned { token: &'a str },
    /// `{nonce, epoch, token, username, deviceId}`
    DelegatedSigned {
        token: &'a str,
        username: &'a str,
        device_id: &'a str,
    },
}

/// Assembles claim sets, calling each generator exactly once per build
#[derive(Clone)]
pub struct PayloadBuilder {
    nonce_generator: Arc<dyn NonceGenerator>,
    epoch_generator: Arc<dyn EpochGenerator>,
    claims_manager: Arc<dyn PayloadClaimsManager>,
    names: ClaimNames,
}

impl PayloadBuilder {
    pub fn new(
        nonce_generator: Arc<dyn NonceGenerator>,
        epoch_generator: Arc<dyn EpochGenerator>,
        claims_manager: Arc<dyn PayloadClaimsManager>,
        names: ClaimNames,
    ) -> Self {
        Self {
            nonce_generator,
            epoch_generator,
            claims_manager,
            names,
        }
    }

    pub fn names(&self) -> &ClaimNames {
        &self.names
    }

    pub fn build(&self, shape: ClaimShape<'_>) -> ClaimSet {
        let manager = self.claims_manager.as_ref();
        let names = &self.names;
        let mut claims = ClaimSet::new();

        manager.add_nonce_claim(&mut claims, names, self.nonce_generator.next_nonce());
        manager.add_epoch_claim(&mut claims, names, self.epoch_generator.seconds());

        match shape {
            ClaimShape::AutonomousSignin => {}
            ClaimShape::DelegatedSignin { user, device_id } => {
                manager.add_doc_type_claim(&mut claims, names, &user.doc_type);
                manager.add_doc_number_claim(&mut claims, names, &user.doc_number);
                manager.add_password_claim(&mut claims, names, &user.password);
                manager.add_device_id_claim(&mut claims, names, device_id);
            }
            ClaimShape::AutonomousSigned { token } => {
                manager.add_token_claim(&mut claims, names, token);
            }
            ClaimShape::DelegatedSigned {
                token,
                username,
                device_id,
            } => {
                manager.add_token_claim(&mut claims, names, token);
                manager.add_username_claim(&mut claims, names, username);
                manager.add_device_id_claim(&mut claims, names, device_id);
            }
        }

        claims
    }

    pub fn signin_claims(&self) -> ClaimSet {
        self.build(ClaimShape::AutonomousSignin)
    }

    pub fn delegated_signin_claims(&self, user: &UserIdentity, device_id: &str) -> ClaimSet {
        self.build(ClaimShape::DelegatedSignin { user, device_id })
    }

    pub fn signed_claims(&self, token: &str) -> ClaimSet {
        self.build(ClaimShape::AutonomousSigned { token })
    }

    pub fn delegated_signed_claims(&self, token: &str, username: &str, device_id: &str) -> ClaimSet {
        self.build(ClaimShape::DelegatedSigned {
            token,
            username,
            device_id,
        })
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(
            Arc::new(UuidNonceGenerator),
            Arc::new(UnixEpochGenerator),
            Arc::new(DefaultPayloadClaimsManager),
            ClaimNames::default(),
        )
    }
}

impl fmt::Debug for PayloadBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadBuilder")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}
