//! The session store.
//!
//! All mutation is serialized behind one write lock that is held across the
//! medium write, so a clear issued after a set is always applied after it.
//! Reads are served from the in-memory snapshot and never touch the medium.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::medium::{Change, MemoryMedium, SessionMedium};

/// Key holding the bearer credential.
pub const TOKEN_KEY: &str = "token";

/// Key holding the serialized identity.
pub const USER_KEY: &str = "user";

/// Key holding the credential expiry (RFC 3339), when known.
pub const EXPIRES_AT_KEY: &str = "token_expires_at";

const ALL_KEYS: [&str; 3] = [TOKEN_KEY, USER_KEY, EXPIRES_AT_KEY];

/// A bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the credential is past its expiry. Credentials without an
    /// expiry never expire locally.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub credential: Option<Credential>,
    pub identity: Option<Identity>,
}

/// Single source of truth for the current credential and identity.
#[derive(Debug)]
pub struct SessionStore {
    medium: Box<dyn SessionMedium>,
    state: RwLock<Session>,
}

/// Shared session store for use across async contexts.
pub type SharedSessionStore = Arc<SessionStore>;

impl SessionStore {
    /// Open a store over `medium`, loading whatever it already holds.
    ///
    /// An identity persisted without a credential is purged, as is an
    /// identity that no longer decodes. A document that does not decode at
    /// all is treated as signed out and rewritten empty.
    pub fn open(medium: impl SessionMedium + 'static) -> Result<Self> {
        let entries = match medium.load() {
            Ok(entries) => entries,
            Err(Error::Corrupt(msg)) => {
                warn!(error = %msg, "Session document is corrupt; starting signed out");
                let reset: Vec<Change> = ALL_KEYS.iter().map(|k| Change::Remove(*k)).collect();
                if let Err(e) = medium.apply(&reset) {
                    warn!(error = %e, "Could not replace corrupt session document");
                }
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        let credential = entries.get(TOKEN_KEY).map(|token| Credential {
            token: token.clone(),
            expires_at: entries
                .get(EXPIRES_AT_KEY)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|at| at.with_timezone(&Utc)),
        });

        let mut purge = Vec::new();
        let identity = match entries.get(USER_KEY) {
            Some(_) if credential.is_none() => {
                warn!("Purging cached identity with no credential");
                purge.push(Change::Remove(USER_KEY));
                None
            }
            Some(raw) => match serde_json::from_str::<Identity>(raw) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!(error = %e, "Purging undecodable cached identity");
                    purge.push(Change::Remove(USER_KEY));
                    None
                }
            },
            None => None,
        };

        if credential.is_none() && entries.contains_key(EXPIRES_AT_KEY) {
            purge.push(Change::Remove(EXPIRES_AT_KEY));
        }
        if !purge.is_empty() {
            medium.apply(&purge)?;
        }

        Ok(Self {
            medium: Box::new(medium),
            state: RwLock::new(Session {
                credential,
                identity,
            }),
        })
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            medium: Box::new(MemoryMedium::new()),
            state: RwLock::new(Session::default()),
        }
    }

    /// Store a credential with no known expiry.
    pub fn set_credential(&self, token: impl Into<String>) -> Result<()> {
        self.store_credential(Credential {
            token: token.into(),
            expires_at: None,
        })
    }

    /// Store a credential that expires `expires_in` from now.
    pub fn set_credential_with_expiry(
        &self,
        token: impl Into<String>,
        expires_in: Duration,
    ) -> Result<()> {
        let expires_at = chrono::Duration::from_std(expires_in)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        self.store_credential(Credential {
            token: token.into(),
            expires_at,
        })
    }

    fn store_credential(&self, credential: Credential) -> Result<()> {
        let mut state = self.state.write();

        let mut changes = vec![Change::Put(TOKEN_KEY, credential.token.clone())];
        match credential.expires_at {
            Some(at) => changes.push(Change::Put(EXPIRES_AT_KEY, at.to_rfc3339())),
            None => changes.push(Change::Remove(EXPIRES_AT_KEY)),
        }

        // The cached identity belongs to the credential it was resolved with.
        let replaced = state
            .credential
            .as_ref()
            .is_some_and(|c| c.token != credential.token);
        if replaced {
            changes.push(Change::Remove(USER_KEY));
        }

        self.medium.apply(&changes)?;

        if replaced {
            state.identity = None;
        }
        state.credential = Some(credential);
        debug!("Credential stored");
        Ok(())
    }

    /// Current bearer token, if any.
    pub fn get_credential(&self) -> Option<String> {
        self.state.read().credential.as_ref().map(|c| c.token.clone())
    }

    /// Current credential including its expiry.
    pub fn credential(&self) -> Option<Credential> {
        self.state.read().credential.clone()
    }

    /// Cache the identity resolved for the current credential.
    pub fn set_identity(&self, identity: &Identity) -> Result<()> {
        let mut state = self.state.write();
        if state.credential.is_none() {
            return Err(Error::IdentityWithoutCredential);
        }
        self.write_identity(&mut state, identity)
    }

    /// Cache `identity` only if `token` is still the held credential.
    pub fn set_identity_for(&self, token: &str, identity: &Identity) -> Result<()> {
        let mut state = self.state.write();
        let held = match state.credential.as_ref() {
            Some(credential) => credential.token == token,
            None => return Err(Error::IdentityWithoutCredential),
        };
        if !held {
            debug!(user_id = identity.id, "Discarding identity for a replaced credential");
            return Err(Error::CredentialChanged);
        }
        self.write_identity(&mut state, identity)
    }

    fn write_identity(&self, state: &mut Session, identity: &Identity) -> Result<()> {
        let json = serde_json::to_string(identity)
            .map_err(|e| Error::Corrupt(format!("failed to encode identity: {}", e)))?;
        self.medium.apply(&[Change::Put(USER_KEY, json)])?;

        state.identity = Some(identity.clone());
        debug!(user_id = identity.id, "Identity cached");
        Ok(())
    }

    /// Cached identity, if any.
    pub fn get_identity(&self) -> Option<Identity> {
        self.state.read().identity.clone()
    }

    /// Remove credential and identity together.
    ///
    /// The in-memory session is cleared even if the medium refuses the write;
    /// the medium error is still returned.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.write();
        let changes: Vec<Change> = ALL_KEYS.iter().map(|k| Change::Remove(*k)).collect();
        let result = self.medium.apply(&changes);

        *state = Session::default();
        match &result {
            Ok(()) => info!("Session cleared"),
            Err(e) => warn!(error = %e, "Session cleared in memory but not in storage"),
        }
        result
    }

    /// True iff a credential is held. Identity is not required.
    pub fn is_authenticated(&self) -> bool {
        self.state.read().credential.is_some()
    }

    /// True iff the held credential has a known expiry that has passed.
    pub fn is_expired(&self) -> bool {
        self.state
            .read()
            .credential
            .as_ref()
            .is_some_and(|c| c.is_expired_at(Utc::now()))
    }

    /// Consistent copy of the whole session.
    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::FileMedium;
    use tempfile::tempdir;

    fn identity(id: u64) -> Identity {
        Identity {
            id,
            email: format!("user{}@example.com", id),
            name: format!("User {}", id),
            created_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            updated_at: "2024-01-02T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_credential_round_trip() {
        let store = SessionStore::in_memory();
        for token in ["a", "eyJhbGciOiJIUzI1NiJ9.e30.sig", "  spaced  ", ""] {
            store.set_credential(token).unwrap();
            assert_eq!(store.get_credential().as_deref(), Some(token));
        }
    }

    #[test]
    fn test_identity_round_trip() {
        let store = SessionStore::in_memory();
        store.set_credential("t").unwrap();
        let user = identity(42);
        store.set_identity(&user).unwrap();
        assert_eq!(store.get_identity(), Some(user));
    }

    #[test]
    fn test_identity_requires_credential() {
        let store = SessionStore::in_memory();
        let err = store.set_identity(&identity(1)).unwrap_err();
        assert!(matches!(err, Error::IdentityWithoutCredential));
        assert!(store.get_identity().is_none());
    }

    #[test]
    fn test_identity_for_replaced_credential_is_refused() {
        let store = SessionStore::in_memory();
        store.set_credential("token-A").unwrap();
        store.set_credential("token-B").unwrap();

        let err = store.set_identity_for("token-A", &identity(1)).unwrap_err();
        assert!(matches!(err, Error::CredentialChanged));
        assert_eq!(store.get_credential().as_deref(), Some("token-B"));
        assert!(store.get_identity().is_none());

        store.set_identity_for("token-B", &identity(2)).unwrap();
        assert_eq!(store.get_identity(), Some(identity(2)));
    }

    #[test]
    fn test_identity_for_after_clear_is_refused() {
        let store = SessionStore::in_memory();
        store.set_credential("t").unwrap();
        store.clear().unwrap();
        let err = store.set_identity_for("t", &identity(1)).unwrap_err();
        assert!(matches!(err, Error::IdentityWithoutCredential));
    }

    #[test]
    fn test_clear_removes_both() {
        let store = SessionStore::in_memory();
        store.set_credential("t").unwrap();
        store.set_identity(&identity(1)).unwrap();

        store.clear().unwrap();
        assert!(store.get_credential().is_none());
        assert!(store.get_identity().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_is_authenticated_without_identity() {
        let store = SessionStore::in_memory();
        assert!(!store.is_authenticated());
        store.set_credential("t").unwrap();
        assert!(store.is_authenticated());
        assert!(store.get_identity().is_none());
    }

    #[test]
    fn test_new_credential_drops_stale_identity() {
        let store = SessionStore::in_memory();
        store.set_credential("first").unwrap();
        store.set_identity(&identity(1)).unwrap();

        store.set_credential("first").unwrap();
        assert!(store.get_identity().is_some());

        store.set_credential("second").unwrap();
        assert!(store.get_identity().is_none());
    }

    #[test]
    fn test_storage_unavailable_is_surfaced() {
        let medium = MemoryMedium::new();
        medium.set_fail_writes(true);
        let store = SessionStore::open(medium).unwrap();

        let err = store.set_credential("t").unwrap_err();
        assert!(err.is_storage_unavailable());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clear_with_failing_medium_still_clears_memory() {
        let medium = MemoryMedium::with_entries([("token", "t")]);
        medium.set_fail_writes(true);
        let store = SessionStore::open(medium).unwrap();
        assert!(store.is_authenticated());
        assert!(store.clear().is_err());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_open_purges_orphan_identity() {
        let json = serde_json::to_string(&identity(3)).unwrap();
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.json");
        FileMedium::new(&path)
            .apply(&[Change::Put(USER_KEY, json)])
            .unwrap();

        let store = SessionStore::open(FileMedium::new(&path)).unwrap();
        assert!(store.get_identity().is_none());
        assert!(FileMedium::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn test_open_over_corrupt_document_starts_signed_out() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.json");
        std::fs::write(&path, "{truncated").unwrap();

        let store = SessionStore::open(FileMedium::new(&path)).unwrap();
        assert_eq!(store.snapshot(), Session::default());
        assert!(FileMedium::new(&path).load().unwrap().is_empty());

        store.set_credential("fresh").unwrap();
        let reopened = SessionStore::open(FileMedium::new(&path)).unwrap();
        assert_eq!(reopened.get_credential().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_open_purges_undecodable_identity() {
        let store = SessionStore::open(MemoryMedium::with_entries([
            ("token", "t"),
            ("user", "{broken"),
        ]))
        .unwrap();
        assert!(store.is_authenticated());
        assert!(store.get_identity().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.json");

        let store = SessionStore::open(FileMedium::new(&path)).unwrap();
        store
            .set_credential_with_expiry("persisted", Duration::from_secs(3600))
            .unwrap();
        store.set_identity(&identity(9)).unwrap();
        drop(store);

        let reopened = SessionStore::open(FileMedium::new(&path)).unwrap();
        assert_eq!(reopened.get_credential().as_deref(), Some("persisted"));
        assert_eq!(reopened.get_identity(), Some(identity(9)));
        assert!(reopened.credential().unwrap().expires_at.is_some());
        assert!(!reopened.is_expired());

        reopened.clear().unwrap();
        let again = SessionStore::open(FileMedium::new(&path)).unwrap();
        assert_eq!(again.snapshot(), Session::default());
    }

    #[test]
    fn test_expiry() {
        let store = SessionStore::in_memory();
        store
            .set_credential_with_expiry("t", Duration::from_secs(0))
            .unwrap();
        assert!(store.is_authenticated());
        assert!(store.is_expired());

        store.set_credential("t").unwrap();
        assert!(!store.is_expired());
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let credential = Credential {
            token: "super-secret".to_string(),
            expires_at: None,
        };
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_concurrent_set_and_clear_settle() {
        let store = Arc::new(SessionStore::in_memory());
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        store.set_credential(format!("t{}", i)).unwrap();
                        let _ = store.set_identity(&identity(i));
                    } else {
                        store.clear().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let session = store.snapshot();
        if session.identity.is_some() {
            assert!(session.credential.is_some());
        }
    }
}
