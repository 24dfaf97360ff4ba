//! Storage collaborator interfaces and the in-process implementation.
//!
//! The core treats persistence as an external capability: identity rows and
//! refresh-token records are reached only through the traits below. The
//! bundled [`MemoryStore`] provides row-level atomicity behind `parking_lot`
//! locks; a database-backed implementation can replace it without touching
//! the workflows.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::tprintln;

/// One issued refresh token. The token string doubles as the lookup key.
/// Revocation flips the flag; the record itself is kept for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub identity_id: u64,
    pub revoked: bool,
}

pub trait IdentityStore: Send + Sync {
    fn find_by_login(&self, login: &str) -> Option<Identity>;
    fn exists_by_login(&self, login: &str) -> bool;
    /// Assigns the id and persists the new identity. Fails with `LoginTaken`
    /// when the login is already present (logins are globally unique).
    fn insert(
        &self,
        login: &str,
        email: &str,
        password_hash: &str,
        roles: BTreeSet<String>,
    ) -> AuthResult<Identity>;
    fn update_roles(&self, login: &str, roles: BTreeSet<String>) -> AuthResult<()>;
}

pub trait RefreshTokenStore: Send + Sync {
    fn find(&self, token: &str) -> Option<RefreshTokenRecord>;
    fn put(&self, record: RefreshTokenRecord);
    /// Delete every record owned by the identity; returns how many went.
    fn delete_all_for(&self, identity_id: u64) -> usize;
    /// Supersede-and-store as one atomic operation: delete every record owned
    /// by the identity and insert the replacement under a single write lock,
    /// so a crash or a racing login cannot observe the in-between state.
    fn replace_for(&self, identity_id: u64, record: RefreshTokenRecord) -> usize;
    /// Mark the record revoked. Returns false when no record matches; the
    /// caller decides whether that matters.
    fn mark_revoked(&self, token: &str) -> bool;
}

/// In-memory store of record. Owns its maps outright (no process-global
/// state) so tests can run isolated instances side by side.
#[derive(Default)]
pub struct MemoryStore {
    identities: RwLock<HashMap<String, Identity>>,
    refresh_tokens: RwLock<HashMap<String, RefreshTokenRecord>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            identities: RwLock::new(HashMap::new()),
            refresh_tokens: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl IdentityStore for MemoryStore {
    fn find_by_login(&self, login: &str) -> Option<Identity> {
        self.identities.read().get(login).cloned()
    }

    fn exists_by_login(&self, login: &str) -> bool {
        self.identities.read().contains_key(login)
    }

    fn insert(
        &self,
        login: &str,
        email: &str,
        password_hash: &str,
        roles: BTreeSet<String>,
    ) -> AuthResult<Identity> {
        let mut map = self.identities.write();
        if map.contains_key(login) {
            return Err(AuthError::LoginTaken);
        }
        let identity = Identity {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            login: login.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            roles,
        };
        map.insert(login.to_string(), identity.clone());
        Ok(identity)
    }

    fn update_roles(&self, login: &str, roles: BTreeSet<String>) -> AuthResult<()> {
        let mut map = self.identities.write();
        let Some(identity) = map.get_mut(login) else {
            return Err(AuthError::IdentityNotFound { login: login.to_string() });
        };
        identity.roles = roles;
        Ok(())
    }
}

impl RefreshTokenStore for MemoryStore {
    fn find(&self, token: &str) -> Option<RefreshTokenRecord> {
        self.refresh_tokens.read().get(token).cloned()
    }

    fn put(&self, record: RefreshTokenRecord) {
        self.refresh_tokens.write().insert(record.token.clone(), record);
    }

    fn delete_all_for(&self, identity_id: u64) -> usize {
        let mut map = self.refresh_tokens.write();
        let before = map.len();
        map.retain(|_, rec| rec.identity_id != identity_id);
        before - map.len()
    }

    fn replace_for(&self, identity_id: u64, record: RefreshTokenRecord) -> usize {
        let mut map = self.refresh_tokens.write();
        let before = map.len();
        map.retain(|_, rec| rec.identity_id != identity_id);
        let superseded = before - map.len();
        map.insert(record.token.clone(), record);
        tprintln!("refresh.replace identity={} superseded={}", identity_id, superseded);
        superseded
    }

    fn mark_revoked(&self, token: &str) -> bool {
        let mut map = self.refresh_tokens.write();
        match map.get_mut(token) {
            Some(rec) => {
                rec.revoked = true;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest_roles() -> BTreeSet<String> {
        BTreeSet::from(["GUEST".to_string()])
    }

    #[test]
    fn insert_assigns_ids_and_enforces_unique_login() {
        let store = MemoryStore::new();
        let a = store.insert("alice", "a@x.com", "phc-a", guest_roles()).unwrap();
        let b = store.insert("bob", "b@x.com", "phc-b", guest_roles()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.insert("alice", "other@x.com", "phc", guest_roles()), Err(AuthError::LoginTaken));
        // login is case-sensitive: "Alice" is a different principal
        assert!(store.insert("Alice", "A@x.com", "phc", guest_roles()).is_ok());
    }

    #[test]
    fn replace_for_supersedes_only_the_owner() {
        let store = MemoryStore::new();
        store.put(RefreshTokenRecord { token: "t1".into(), identity_id: 1, revoked: false });
        store.put(RefreshTokenRecord { token: "t2".into(), identity_id: 1, revoked: false });
        store.put(RefreshTokenRecord { token: "t3".into(), identity_id: 2, revoked: false });

        let superseded = store.replace_for(1, RefreshTokenRecord { token: "t4".into(), identity_id: 1, revoked: false });
        assert_eq!(superseded, 2);
        assert!(store.find("t1").is_none());
        assert!(store.find("t2").is_none());
        assert!(store.find("t4").is_some());
        // other identities untouched
        assert!(store.find("t3").is_some());
    }

    #[test]
    fn mark_revoked_keeps_the_record() {
        let store = MemoryStore::new();
        store.put(RefreshTokenRecord { token: "t1".into(), identity_id: 1, revoked: false });
        assert!(store.mark_revoked("t1"));
        assert!(store.find("t1").unwrap().revoked);
        // unknown token: reported, not an error
        assert!(!store.mark_revoked("missing"));
    }
}
