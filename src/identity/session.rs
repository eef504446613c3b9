use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::credentials::{Credential, CredentialStore, MemoryCredentialStore};
use super::principal::Identity;
use crate::error::AppResult;

/// Credential and identity travel together: a session is either fully
/// authenticated or anonymous, never half of each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    auth: Option<(Credential, Identity)>,
}

impl Session {
    pub fn anonymous() -> Self { Self { auth: None } }

    pub fn authenticated(credential: Credential, identity: Identity) -> Self {
        Self { auth: Some((credential, identity)) }
    }

    pub fn is_authenticated(&self) -> bool { self.auth.is_some() }
    pub fn credential(&self) -> Option<&Credential> { self.auth.as_ref().map(|(c, _)| c) }
    pub fn identity(&self) -> Option<&Identity> { self.auth.as_ref().map(|(_, i)| i) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Persisted credential not yet revalidated.
    Initializing,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub session: Session,
}

struct StoreInner {
    credentials: Arc<dyn CredentialStore>,
    state: watch::Sender<SessionSnapshot>,
}

/// Owned handle to the current session. Cheap to clone; every clone sees the
/// same state. Only the auth controller writes to it.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot { phase: SessionPhase::Initializing, session: Session::anonymous() });
        Self { inner: Arc::new(StoreInner { credentials, state }) }
    }

    pub fn in_memory() -> Self { Self::new(Arc::new(MemoryCredentialStore::default())) }

    pub fn get(&self) -> Session { self.inner.state.borrow().session.clone() }
    pub fn snapshot(&self) -> SessionSnapshot { self.inner.state.borrow().clone() }
    pub fn phase(&self) -> SessionPhase { self.inner.state.borrow().phase }
    pub fn credential(&self) -> Option<Credential> { self.inner.state.borrow().session.credential().cloned() }

    /// Receiver notified on every session or phase change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> { self.inner.state.subscribe() }

    pub(crate) fn persisted_credential(&self) -> AppResult<Option<Credential>> { self.inner.credentials.load() }

    /// Persist first; the in-memory session only changes once the write succeeded.
    pub(crate) fn set(&self, credential: Credential, identity: Identity) -> AppResult<()> {
        self.inner.credentials.save(&credential)?;
        debug!(target: "session", user_id = %identity.id, role = %identity.role, "session set");
        self.inner.state.send_modify(|s| s.session = Session::authenticated(credential, identity));
        Ok(())
    }

    /// Infallible: a failure to delete the persisted copy is logged and the
    /// in-memory session is cleared regardless.
    pub(crate) fn clear(&self) {
        if let Err(e) = self.inner.credentials.remove() {
            warn!(target: "session", code = e.code_str(), error = %e.message(), "failed to remove persisted credential");
        }
        self.inner.state.send_modify(|s| s.session = Session::anonymous());
        debug!(target: "session", "session cleared");
    }

    pub(crate) fn mark_ready(&self) {
        self.inner.state.send_modify(|s| s.phase = SessionPhase::Ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::identity::Role;

    fn traveler() -> Identity {
        Identity {
            id: "U1".into(),
            display_name: "Tess".into(),
            email: "tess@x.com".into(),
            role: Role::Traveler,
            email_verified: true,
            avatar: None,
            phone: None,
            email_notifications: None,
        }
    }

    struct ReadOnlyStore;

    impl CredentialStore for ReadOnlyStore {
        fn load(&self) -> AppResult<Option<Credential>> { Ok(None) }
        fn save(&self, _: &Credential) -> AppResult<()> { Err(AppError::storage("io", "read-only")) }
        fn remove(&self) -> AppResult<()> { Err(AppError::storage("io", "read-only")) }
    }

    #[test]
    fn set_persists_and_clear_removes() {
        let creds = Arc::new(MemoryCredentialStore::default());
        let store = SessionStore::new(creds.clone());
        assert_eq!(store.phase(), SessionPhase::Initializing);

        store.set(Credential::new("tok").unwrap(), traveler()).unwrap();
        assert!(store.get().is_authenticated());
        assert_eq!(creds.load().unwrap().unwrap().expose(), "tok");

        store.clear();
        assert!(!store.get().is_authenticated());
        assert_eq!(store.get().identity(), None);
        assert_eq!(creds.load().unwrap(), None);
    }

    #[test]
    fn failed_persist_leaves_session_untouched() {
        let store = SessionStore::new(Arc::new(ReadOnlyStore));
        let err = store.set(Credential::new("tok").unwrap(), traveler()).unwrap_err();
        assert_eq!(err.code_str(), "io");
        assert_eq!(store.get(), Session::anonymous());
        // clear still succeeds in memory
        store.clear();
        assert_eq!(store.get(), Session::anonymous());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let store = SessionStore::in_memory();
        let mut rx = store.subscribe();
        store.mark_ready();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().phase, SessionPhase::Ready);
        store.set(Credential::new("tok").unwrap(), traveler()).unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().session.is_authenticated());
    }
}
