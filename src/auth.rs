//! Authentication workflows: register, login, refresh, logout and role
//! assignment, coordinated over the verifier, codec, ledger and identity
//! store. Each workflow is a short one-shot sequence; a partial failure is
//! retried from the top by the caller, not resumed.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::{AuthError, AuthResult};
use crate::identity::{Identity, Role};
use crate::ledger::RefreshTokenLedger;
use crate::security::{self, CredentialVerifier};
use crate::store::{IdentityStore, RefreshTokenStore};
use crate::token::{TokenClaims, TokenCodec};

/// Default admin provisioned at startup when absent.
const DEFAULT_ADMIN_LOGIN: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    verifier: CredentialVerifier,
    codec: Arc<TokenCodec>,
    ledger: RefreshTokenLedger,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<TokenCodec>,
    ) -> Self {
        AuthService {
            verifier: CredentialVerifier::new(identities.clone()),
            ledger: RefreshTokenLedger::new(refresh_tokens, codec.clone()),
            identities,
            codec,
        }
    }

    /// Provision the default admin account when it does not exist yet.
    /// Idempotent across restarts.
    pub fn ensure_default_admin(&self) -> AuthResult<()> {
        if self.identities.exists_by_login(DEFAULT_ADMIN_LOGIN) {
            return Ok(());
        }
        let hash = security::hash_password(DEFAULT_ADMIN_PASSWORD)?;
        self.identities.insert(
            DEFAULT_ADMIN_LOGIN,
            DEFAULT_ADMIN_EMAIL,
            &hash,
            BTreeSet::from([Role::Admin.as_str().to_string()]),
        )?;
        info!("default admin user created: {DEFAULT_ADMIN_LOGIN}");
        Ok(())
    }

    /// Create the identity with the default role and hand out the first token
    /// pair. No supersession happens here: a fresh identity has no prior
    /// refresh tokens.
    pub fn register(&self, email: &str, login: &str, password: &str) -> AuthResult<TokenPair> {
        info!(login = %login, "registering new user");
        if self.identities.exists_by_login(login) {
            return Err(AuthError::LoginTaken);
        }
        let hash = security::hash_password(password)?;
        let identity = self.identities.insert(
            login,
            email,
            &hash,
            BTreeSet::from([Role::Guest.as_str().to_string()]),
        )?;
        let pair = self.issue_pair(&identity)?;
        self.ledger.store(&pair.refresh_token, identity.id);
        Ok(pair)
    }

    /// Verify credentials, then swap the identity's refresh-token set for the
    /// freshly issued one. Every refresh token from earlier logins dies here.
    pub fn login(&self, login: &str, password: &str) -> AuthResult<TokenPair> {
        info!(login = %login, "attempting login");
        let identity = self.verifier.verify(login, password)?;
        let pair = self.issue_pair(&identity)?;
        self.ledger.replace(identity.id, &pair.refresh_token);
        info!(login = %login, "login successful");
        Ok(pair)
    }

    /// Exchange a valid refresh token for a new access token. The refresh
    /// token itself is not rotated; the same string is echoed back.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        info!("attempting access token refresh");
        let claims = self.codec.decode(refresh_token)?;
        let identity = self
            .identities
            .find_by_login(&claims.sub)
            .ok_or_else(|| AuthError::IdentityNotFound { login: claims.sub.clone() })?;
        self.ledger.validate(refresh_token)?;
        let access_token = self.codec.issue_access(&identity)?;
        info!(login = %identity.login, "access token refreshed");
        Ok(TokenPair { access_token, refresh_token: refresh_token.to_string() })
    }

    /// Validate then revoke the refresh token. Success is silent; the second
    /// logout with the same token fails at the validate stage.
    pub fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        info!("attempting logout");
        self.ledger.validate(refresh_token)?;
        self.ledger.revoke(refresh_token);
        Ok(())
    }

    /// Admin-gated role assignment. Assigning an already-held role is
    /// rejected, so the role set only ever grows by actual changes.
    pub fn assign_role(&self, login: &str, role: Role) -> AuthResult<()> {
        let identity = self
            .identities
            .find_by_login(login)
            .ok_or_else(|| AuthError::IdentityNotFound { login: login.to_string() })?;
        if identity.has_role(role) {
            return Err(AuthError::RoleAlreadyAssigned { role: role.as_str().to_string() });
        }
        let mut roles = identity.roles.clone();
        roles.insert(role.as_str().to_string());
        self.identities.update_roles(login, roles)?;
        info!(login = %login, role = role.as_str(), "role assigned");
        Ok(())
    }

    /// Identity lookup for the request propagator.
    pub fn resolve(&self, login: &str) -> Option<Identity> {
        self.identities.find_by_login(login)
    }

    pub fn decode_token(&self, token: &str) -> AuthResult<TokenClaims> {
        self.codec.decode(token)
    }

    pub fn token_expired(&self, claims: &TokenClaims) -> bool {
        self.codec.is_expired(claims)
    }

    /// Ledger access for flows and tests that need validation directly.
    pub fn ledger(&self) -> &RefreshTokenLedger {
        &self.ledger
    }

    fn issue_pair(&self, identity: &Identity) -> AuthResult<TokenPair> {
        let access_token = self.codec.issue_access(identity)?;
        let refresh_token = self.codec.issue_refresh(identity)?;
        Ok(TokenPair { access_token, refresh_token })
    }
}
