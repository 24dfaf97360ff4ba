//! Refresh-token ledger: persistence and validation rules for issued
//! refresh tokens, including supersession on login and revocation on logout.

use std::sync::Arc;

use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::store::{RefreshTokenRecord, RefreshTokenStore};
use crate::token::TokenCodec;

pub struct RefreshTokenLedger {
    records: Arc<dyn RefreshTokenStore>,
    codec: Arc<TokenCodec>,
}

impl RefreshTokenLedger {
    pub fn new(records: Arc<dyn RefreshTokenStore>, codec: Arc<TokenCodec>) -> Self {
        RefreshTokenLedger { records, codec }
    }

    /// Delete every record owned by the identity. Called before a new login
    /// token is stored; registration skips this (no prior tokens exist).
    pub fn supersede(&self, identity_id: u64) {
        let n = self.records.delete_all_for(identity_id);
        if n > 0 {
            debug!(identity_id, superseded = n, "prior refresh tokens superseded");
        }
    }

    pub fn store(&self, token: &str, identity_id: u64) {
        self.records.put(RefreshTokenRecord {
            token: token.to_string(),
            identity_id,
            revoked: false,
        });
    }

    /// Supersede + store as one atomic store operation, so a login can never
    /// leave an identity with both the stale and the fresh token valid.
    pub fn replace(&self, identity_id: u64, token: &str) {
        let superseded = self.records.replace_for(
            identity_id,
            RefreshTokenRecord { token: token.to_string(), identity_id, revoked: false },
        );
        if superseded > 0 {
            debug!(identity_id, superseded, "prior refresh tokens superseded");
        }
    }

    /// Checks run in fixed order and the first failing one is reported:
    /// unknown record, then embedded-claims expiry, then the revoked flag.
    pub fn validate(&self, token: &str) -> AuthResult<RefreshTokenRecord> {
        let Some(record) = self.records.find(token) else {
            return Err(AuthError::TokenNotFound);
        };
        let claims = self.codec.decode(token)?;
        if self.codec.is_expired(&claims) {
            return Err(AuthError::TokenExpired);
        }
        if record.revoked {
            return Err(AuthError::TokenAlreadyRevoked);
        }
        Ok(record)
    }

    /// Idempotent: marks the record revoked when present, no-ops silently
    /// otherwise. Callers that care whether the token exists run `validate`
    /// first.
    pub fn revoke(&self, token: &str) {
        if !self.records.mark_revoked(token) {
            debug!("revoke on unknown refresh token ignored");
        }
    }
}
