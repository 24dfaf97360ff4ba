//! Identity model: registered principals, the closed role set, and the
//! narrow read-only view handed to the token codec and request propagation.

use std::collections::BTreeSet;
use std::fmt;

/// Closed set of role names known to the service. Roles are persisted as
/// strings on the identity; this enum exists for the call sites that need the
/// closed set (defaults, assignment endpoints, gating).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Guest,
    Admin,
    PremiumUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "GUEST",
            Role::Admin => "ADMIN",
            Role::PremiumUser => "PREMIUM_USER",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "GUEST" => Some(Role::Guest),
            "ADMIN" => Some(Role::Admin),
            "PREMIUM_USER" => Some(Role::PremiumUser),
            _ => None,
        }
    }
}

/// A registered principal. The password verifier is an opaque PHC string and
/// must never leave the process: `Identity` is deliberately not `Serialize`,
/// and `Debug` redacts the hash so it cannot reach logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: u64,
    pub login: String,
    pub email: String,
    pub password_hash: String,
    /// Non-empty after registration; grows via role assignment only.
    pub roles: BTreeSet<String>,
}

impl Identity {
    /// Derived read-only view consumed by the token codec and the identity
    /// propagator: just the username and the granted role names.
    pub fn principal(&self) -> Principal {
        Principal {
            username: self.login.clone(),
            authorities: self.roles.iter().cloned().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role.as_str())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("login", &self.login)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Narrow capability view of an identity: who they are and what they were
/// granted, nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub authorities: Vec<String>,
}

/// Caller identity established for the duration of one request by the
/// propagation middleware. Threaded explicitly through request extensions,
/// never held in ambient global state.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: u64,
    pub login: String,
    pub roles: Vec<String>,
}

impl CurrentUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [Role::Guest, Role::Admin, Role::PremiumUser] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("SUPERUSER"), None);
    }

    #[test]
    fn debug_redacts_password_hash() {
        let identity = Identity {
            id: 7,
            login: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            roles: BTreeSet::from(["GUEST".to_string()]),
        };
        let rendered = format!("{identity:?}");
        assert!(!rendered.contains("argon2id"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn principal_exposes_only_username_and_authorities() {
        let identity = Identity {
            id: 1,
            login: "bob".into(),
            email: "b@x.com".into(),
            password_hash: "phc".into(),
            roles: BTreeSet::from(["ADMIN".to_string(), "GUEST".to_string()]),
        };
        let principal = identity.principal();
        assert_eq!(principal.username, "bob");
        // BTreeSet iteration keeps the claim order stable
        assert_eq!(principal.authorities, vec!["ADMIN".to_string(), "GUEST".to_string()]);
    }
}
