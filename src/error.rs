//! Unified authentication error model and mapping helpers.
//! This module provides the common error enum used across the token codec,
//! credential verifier, refresh-token ledger and HTTP surface, along with the
//! HTTP status mapping applied at the request boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// Bad credentials. Deliberately covers both unknown-login and
    /// wrong-password so callers cannot enumerate accounts.
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("malformed token")]
    MalformedToken,
    #[error("unsupported token")]
    UnsupportedToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("refresh token not found")]
    TokenNotFound,
    #[error("token already revoked")]
    TokenAlreadyRevoked,
    /// Internal lookup failure; sanitized to `AuthenticationFailed` before it
    /// crosses the boundary.
    #[error("identity not found: {login}")]
    IdentityNotFound { login: String },
    #[error("role {role} already assigned")]
    RoleAlreadyAssigned { role: String },
    #[error("login already taken")]
    LoginTaken,
    #[error("{message}")]
    UserInput { message: String },
    #[error("signing secret rejected: {reason}")]
    WeakSecret { reason: String },
    /// Uncategorized failure. Logged server-side; the boundary emits a generic
    /// body so no internal state leaks.
    #[error("internal error: {message}")]
    Internal { message: String },
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        AuthError::Internal { message: message.into() }
    }

    pub fn user_input<S: Into<String>>(message: S) -> Self {
        AuthError::UserInput { message: message.into() }
    }

    /// Stable machine-readable code used in JSON error bodies.
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::AuthenticationFailed => "authentication_failed",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedToken => "unsupported_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotFound => "token_not_found",
            AuthError::TokenAlreadyRevoked => "token_already_revoked",
            AuthError::IdentityNotFound { .. } => "identity_not_found",
            AuthError::RoleAlreadyAssigned { .. } => "role_already_assigned",
            AuthError::LoginTaken => "login_taken",
            AuthError::UserInput { .. } => "user_input",
            AuthError::WeakSecret { .. } => "weak_secret",
            AuthError::Internal { .. } => "internal_error",
        }
    }

    /// Map to HTTP status code. 401 means "truly unauthenticated", 403 means
    /// "recognized but rejected"; uncategorized failures are a conservative 403.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::AuthenticationFailed => 401,
            AuthError::MalformedToken => 403,
            AuthError::UnsupportedToken => 403,
            AuthError::InvalidToken => 401,
            AuthError::TokenExpired => 403,
            AuthError::TokenNotFound => 401,
            AuthError::TokenAlreadyRevoked => 403,
            AuthError::IdentityNotFound { .. } => 401,
            AuthError::RoleAlreadyAssigned { .. } => 409,
            AuthError::LoginTaken => 409,
            AuthError::UserInput { .. } => 400,
            AuthError::WeakSecret { .. } => 500,
            AuthError::Internal { .. } => 403,
        }
    }

    /// Variant safe to show to the caller. Internal lookup failures collapse
    /// into the generic credential error, uncategorized failures lose their
    /// message.
    pub fn sanitized(&self) -> AuthError {
        match self {
            AuthError::IdentityNotFound { .. } => AuthError::AuthenticationFailed,
            AuthError::Internal { .. } => AuthError::internal("internal error"),
            other => other.clone(),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AuthError::AuthenticationFailed.http_status(), 401);
        assert_eq!(AuthError::MalformedToken.http_status(), 403);
        assert_eq!(AuthError::UnsupportedToken.http_status(), 403);
        assert_eq!(AuthError::InvalidToken.http_status(), 401);
        assert_eq!(AuthError::TokenExpired.http_status(), 403);
        assert_eq!(AuthError::TokenNotFound.http_status(), 401);
        assert_eq!(AuthError::TokenAlreadyRevoked.http_status(), 403);
        assert_eq!(AuthError::RoleAlreadyAssigned { role: "ADMIN".into() }.http_status(), 409);
        assert_eq!(AuthError::LoginTaken.http_status(), 409);
        assert_eq!(AuthError::user_input("bad").http_status(), 400);
        assert_eq!(AuthError::internal("boom").http_status(), 403);
    }

    #[test]
    fn sanitized_hides_internal_detail() {
        let e = AuthError::IdentityNotFound { login: "alice".into() };
        assert_eq!(e.sanitized(), AuthError::AuthenticationFailed);

        let e = AuthError::internal("store exploded at row 17");
        match e.sanitized() {
            AuthError::Internal { message } => assert_eq!(message, "internal error"),
            other => panic!("unexpected: {other:?}"),
        }

        // Token errors pass through unchanged
        assert_eq!(AuthError::TokenExpired.sanitized(), AuthError::TokenExpired);
    }
}
