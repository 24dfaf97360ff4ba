//! Signed token codec: issues and decodes the HS256 tokens that carry
//! subject, timestamps and granted roles.
//!
//! Expiry is deliberately NOT enforced during decode: a stale token still
//! decodes so callers can tell "was valid, now stale" apart from "never
//! valid". Freshness is a separate, pure check via [`TokenCodec::is_expired`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;

/// Minimum decoded key material accepted for HS256 signing.
const MIN_SECRET_BYTES: usize = 32;

/// Claims embedded in every issued token. Access tokens additionally carry
/// the identity id and email; refresh tokens leave them unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the login.
    pub sub: String,
    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,
    /// Expiry (Unix timestamp, seconds); issue time plus the configured
    /// validity window.
    pub exp: i64,
    /// Granted role names, e.g. `["GUEST"]`.
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Build a codec from the configured base64 secret. The secret is decoded
    /// to raw bytes before use as key material; undecodable or short secrets
    /// are rejected up front rather than at first issue.
    pub fn new(secret_b64: &str, access_ttl: Duration, refresh_ttl: Duration) -> AuthResult<Self> {
        let key_bytes = BASE64
            .decode(secret_b64.trim())
            .map_err(|e| AuthError::WeakSecret { reason: format!("secret is not valid base64: {e}") })?;
        if key_bytes.len() < MIN_SECRET_BYTES {
            return Err(AuthError::WeakSecret {
                reason: format!("decoded secret is {} bytes, need at least {MIN_SECRET_BYTES}", key_bytes.len()),
            });
        }
        Ok(TokenCodec {
            encoding: EncodingKey::from_secret(&key_bytes),
            decoding: DecodingKey::from_secret(&key_bytes),
            access_ttl,
            refresh_ttl,
        })
    }

    /// Short-lived token presented on each authenticated request. Carries the
    /// identity id and email on top of the common claims.
    pub fn issue_access(&self, identity: &Identity) -> AuthResult<String> {
        self.issue(identity, self.access_ttl, true)
    }

    /// Long-lived token persisted in the ledger and exchanged for new access
    /// tokens.
    pub fn issue_refresh(&self, identity: &Identity) -> AuthResult<String> {
        self.issue(identity, self.refresh_ttl, false)
    }

    fn issue(&self, identity: &Identity, ttl: Duration, with_identity_info: bool) -> AuthResult<String> {
        let principal = identity.principal();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: principal.username,
            iat: now,
            exp: now + ttl.num_seconds(),
            roles: principal.authorities,
            id: with_identity_info.then_some(identity.id),
            email: with_identity_info.then(|| identity.email.clone()),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::internal(format!("token signing failed: {e}")))
    }

    /// Verify signature and structure, returning the embedded claims. Expired
    /// tokens still decode; see module docs.
    pub fn decode(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        match decode::<TokenClaims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => Err(match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::MalformedToken,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    AuthError::UnsupportedToken
                }
                _ => AuthError::InvalidToken,
            }),
        }
    }

    /// Pure freshness check of already-decoded claims against the clock.
    pub fn is_expired(&self, claims: &TokenClaims) -> bool {
        claims.exp < Utc::now().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const SECRET: &str = crate::config::DEV_SECRET_B64;

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, Duration::seconds(900), Duration::seconds(3600)).unwrap()
    }

    fn identity() -> Identity {
        Identity {
            id: 42,
            login: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "phc".into(),
            roles: BTreeSet::from(["GUEST".to_string()]),
        }
    }

    #[test]
    fn round_trip_access_token() {
        let codec = codec();
        let token = codec.issue_access(&identity()).unwrap();
        let claims = codec.decode(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec!["GUEST".to_string()]);
        assert_eq!(claims.id, Some(42));
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.exp - claims.iat, 900);
        assert!(!codec.is_expired(&claims));
    }

    #[test]
    fn refresh_token_omits_identity_info() {
        let codec = codec();
        let token = codec.issue_refresh(&identity()).unwrap();
        let claims = codec.decode(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.id, None);
        assert_eq!(claims.email, None);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn access_and_refresh_tokens_are_distinct() {
        let codec = codec();
        let identity = identity();
        let access = codec.issue_access(&identity).unwrap();
        let refresh = codec.issue_refresh(&identity).unwrap();
        assert!(!access.is_empty() && !refresh.is_empty());
        assert_ne!(access, refresh);
    }

    #[test]
    fn expired_token_decodes_but_reports_expired() {
        let stale = TokenCodec::new(SECRET, Duration::seconds(-60), Duration::seconds(-60)).unwrap();
        let token = stale.issue_access(&identity()).unwrap();
        // Decode succeeds: expiry is an explicit, separate check
        let claims = stale.decode(&token).unwrap();
        assert!(stale.is_expired(&claims));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let codec = codec();
        let token = codec.issue_access(&identity()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        let sig = if parts[2].starts_with('A') { "BBBB" } else { "AAAA" };
        parts[2] = sig;
        let forged = parts.join(".");
        assert_eq!(codec.decode(&forged), Err(AuthError::InvalidToken));
    }

    #[test]
    fn structurally_invalid_token_is_malformed() {
        let codec = codec();
        assert_eq!(codec.decode("not-a-token"), Err(AuthError::MalformedToken));
        assert_eq!(codec.decode(""), Err(AuthError::MalformedToken));
    }

    #[test]
    fn foreign_algorithm_is_unsupported() {
        let codec = codec();
        let key_bytes = BASE64.decode(SECRET).unwrap();
        let claims = TokenClaims {
            sub: "alice".into(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 60,
            roles: vec!["GUEST".into()],
            id: None,
            email: None,
        };
        let hs384 = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(&key_bytes),
        )
        .unwrap();
        assert_eq!(codec.decode(&hs384), Err(AuthError::UnsupportedToken));
    }

    #[test]
    fn short_secret_is_rejected() {
        // "short-secret" decodes to 12 bytes
        let err = TokenCodec::new("c2hvcnQtc2VjcmV0", Duration::seconds(1), Duration::seconds(1));
        assert!(matches!(err, Err(AuthError::WeakSecret { .. })));

        let err = TokenCodec::new("%%% not base64 %%%", Duration::seconds(1), Duration::seconds(1));
        assert!(matches!(err, Err(AuthError::WeakSecret { .. })));
    }
}
