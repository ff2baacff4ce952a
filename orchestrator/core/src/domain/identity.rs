// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pseudonymous user identity
//!
//! Clients that supply no session id are identified by a salted SHA-256 of
//! their network address and agent string, rendered as `user_<16 hex>`.

use concierge_cortex::domain::UserId;
use sha2::{Digest, Sha256};

const ID_PREFIX: &str = "user_";
const ID_HEX_CHARS: usize = 16;

#[derive(Debug, Clone)]
pub struct UserIdentityResolver {
    salt: String,
}

impl UserIdentityResolver {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// An explicit, non-blank id wins (trimmed). Otherwise derive one from
    /// the client address and agent.
    pub fn resolve(&self, explicit: Option<&str>, client_addr: &str, client_agent: &str) -> UserId {
        match explicit.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => UserId::new(id),
            None => self.derive(client_addr, client_agent),
        }
    }

    pub fn derive(&self, client_addr: &str, client_agent: &str) -> UserId {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update([0u8]);
        hasher.update(client_addr.as_bytes());
        hasher.update([0u8]);
        hasher.update(client_agent.as_bytes());
        let digest = hex::encode(hasher.finalize());
        UserId::new(format!("{ID_PREFIX}{}", &digest[..ID_HEX_CHARS]))
    }
}
