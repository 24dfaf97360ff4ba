//! Password hashing and credential verification.
//!
//! The hash algorithm is an opaque capability from the workflows' point of
//! view: everything above this module sees only `verify` and PHC strings.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use tracing::warn;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::store::IdentityStore;

pub fn hash_password(password: &str) -> AuthResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AuthError::internal(format!("salt generation failed: {e}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AuthError::internal(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::internal(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// Checks login credentials against stored identity state. Unknown login and
/// wrong password are indistinguishable to the caller.
pub struct CredentialVerifier {
    identities: Arc<dyn IdentityStore>,
}

impl CredentialVerifier {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        CredentialVerifier { identities }
    }

    pub fn verify(&self, login: &str, password: &str) -> AuthResult<Identity> {
        let Some(identity) = self.identities.find_by_login(login) else {
            warn!("login attempt for unknown user");
            return Err(AuthError::AuthenticationFailed);
        };
        if !verify_password(&identity.password_hash, password) {
            warn!(login = %login, "password mismatch");
            return Err(AuthError::AuthenticationFailed);
        }
        Ok(identity)
    }
}
